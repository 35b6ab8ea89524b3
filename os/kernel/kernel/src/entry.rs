//! # Kernel Entry Point
//!
//! The multiboot2 loader jumps to [`_start`] in 32-bit protected mode with
//! paging off, the boot information pointer in `EBX` and the loader magic in
//! `EAX`. `CS` and `GDTR` are whatever the loader left behind. [`_start`]
//! sets up the boot stack, switches to the kernel's flat GDT and hands both
//! registers to [`kernel_entry`] with the C calling convention.

use crate::boot_paging::{BootPaging, PageDirectory};
use crate::early_panic::early_panic;
use crate::exception_stubs::exception_handlers;
use core::arch::{asm, naked_asm};
use kernel_alloc::{BlockAllocator, IdentityPhysMapper};
use kernel_info::boot::{KernelImage, KernelParams};
use kernel_info::memory::{KERNEL_STACK_SIZE, physical_to_virtual};
use kernel_init::EarlyInitError;
use kernel_interrupts::{Cpu, Gdt, Idt, Pic8259, X86Cpu, X86Ports};
use kernel_memory_addresses::PhysicalAddress;
use kernel_multiboot::{BootInformation, MultibootError};
use kernel_qemu::{QemuLogger, default_level, qemu_trace};
use log::info;

/// 16-byte aligned stack
#[repr(C, align(16))]
struct BootStack([u8; KERNEL_STACK_SIZE]);

#[unsafe(link_section = ".bss.boot")]
static mut BOOT_STACK: BootStack = BootStack([0; KERNEL_STACK_SIZE]);

static GDT: Gdt = Gdt::flat();
static mut PAGE_DIRECTORY: PageDirectory = PageDirectory::new();
static mut IDT: Idt = Idt::new();
static mut KERNEL_PARAMS: KernelParams = KernelParams::zeroed();
static mut BLOCKS: Option<BlockAllocator<'static>> = None;
static mut CPU: Option<Cpu<X86Cpu, Pic8259<X86Ports>>> = None;

unsafe extern "C" {
    /// First byte past the image, from `kernel.ld`.
    static __kernel_end: u8;
}

#[unsafe(no_mangle)]
#[unsafe(naked)]
pub unsafe extern "C" fn _start() -> ! {
    naked_asm!(
        "cli",
        "lea esp, [{stack} + {stack_size}]",
        "xor ebp, ebp",
        // kernel_entry(magic, info)
        "push ebx",
        "push eax",
        "call {gdt}",
        "call {entry}",
        "2:",
        "cli",
        "hlt",
        "jmp 2b",
        stack = sym BOOT_STACK,
        stack_size = const KERNEL_STACK_SIZE,
        gdt = sym load_boot_gdt,
        entry = sym kernel_entry,
    );
}

/// Leaves the arguments pushed by [`_start`] in place.
extern "C" fn load_boot_gdt() {
    // SAFETY: Interrupts are masked and the table is a static in the image.
    unsafe { kernel_interrupts::load_gdt(&GDT) };
}

extern "C" fn kernel_entry(magic: u32, info: *const u8) -> ! {
    #[cfg(feature = "qemu")]
    qemu_trace!("Kernel reporting to QEMU!\n");

    // Fails only if a logger is installed already.
    let _ = QemuLogger::new(default_level()).init();

    let image = KernelImage {
        // SAFETY: Only the address of the linker symbol is taken.
        kernel_end: PhysicalAddress::from_ptr(unsafe { &raw const __kernel_end }),
        stack_top: physical_to_virtual(PhysicalAddress::from_ptr(
            (&raw const BOOT_STACK).wrapping_add(1),
        )),
    };

    // SAFETY: Single-threaded boot, and the directory is only ever touched here.
    let mut paging = unsafe { BootPaging::new(&mut *(&raw mut PAGE_DIRECTORY)) };
    // SAFETY: The loader vouches for the structure at `info`.
    let boot = || unsafe { BootInformation::from_ptr(info, magic) };

    // SAFETY: The memory map comes from the loader; the bitmap lands above the
    // kernel image in identity mapped RAM.
    let blocks = match unsafe { early_init(boot, &image, &mut paging) } {
        Ok(blocks) => blocks,
        Err(e) => early_panic(format_args!("{e}")),
    };
    // SAFETY: Nothing else references the static.
    let blocks = unsafe { &mut *(&raw mut BLOCKS) }.insert(blocks);

    // SAFETY: The PIC pair sits on the standard ports of every PC.
    let pic = unsafe { Pic8259::new(X86Ports) };
    // SAFETY: The IDT is handed out exactly once.
    let idt = unsafe { &mut *(&raw mut IDT) };
    // SAFETY: Nothing else references the static.
    let cpu = unsafe { &mut *(&raw mut CPU) }.insert(Cpu::new(X86Cpu, pic, idt));
    if let Err(e) = cpu.driver_init(&exception_handlers()) {
        early_panic(format_args!("{e}"));
    }

    info!(
        "Early init complete, {} of {} blocks free",
        blocks.free_blocks(),
        blocks.total_blocks()
    );

    loop {
        // SAFETY: Interrupts are enabled; wait for the next one.
        unsafe { asm!("hlt", options(nomem, nostack)) };
    }
}

#[cfg(feature = "params")]
unsafe fn early_init(
    boot: impl FnOnce() -> Result<BootInformation<'static>, MultibootError>,
    image: &KernelImage,
    paging: &mut BootPaging,
) -> Result<BlockAllocator<'static>, EarlyInitError> {
    // SAFETY: Filled once, before anything reads it.
    let params = unsafe { &mut *(&raw mut KERNEL_PARAMS) };
    // SAFETY: Forwarded to the caller.
    unsafe {
        kernel_init::kernel_early_init_with_params(boot, image, &IdentityPhysMapper, paging, params)
    }
}

#[cfg(not(feature = "params"))]
unsafe fn early_init(
    boot: impl FnOnce() -> Result<BootInformation<'static>, MultibootError>,
    image: &KernelImage,
    paging: &mut BootPaging,
) -> Result<BlockAllocator<'static>, EarlyInitError> {
    // SAFETY: Forwarded to the caller.
    unsafe { kernel_init::kernel_early_init(boot, image, &IdentityPhysMapper, paging) }
}
