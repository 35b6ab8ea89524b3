//! # Kernel Boot Handoff

use crate::memory::physical_to_virtual;
use core::mem::{offset_of, size_of};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Multiboot2 boot loader magic, found in `EAX` at kernel entry.
pub const MULTIBOOT2_BOOTLOADER_MAGIC: u32 = 0x36D7_6289;

/// Parameter block filled once by early init and consumed by later stages.
///
/// This is the de-facto boot ABI: keep it `#[repr(C)]`, keep the field order,
/// and keep every field 32 bits wide.
///
/// | Offset | Field                     |
/// |--------|---------------------------|
/// | 0      | `kernel_stack`            |
/// | 4      | `kernel_heap`             |
/// | 8      | `kernel_memory_bitmap`    |
/// | 12     | `allocator_total_blocks`  |
/// | 16     | `allocator_used_blocks`   |
/// | 20     | `rsdt_address`            |
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct KernelParams {
    /// Top of the kernel stack (virtual).
    pub kernel_stack: VirtualAddress,

    /// First byte above the kernel image (virtual); the kernel heap starts here.
    pub kernel_heap: VirtualAddress,

    /// Block allocator bitmap, translated to its higher-half alias.
    pub kernel_memory_bitmap: VirtualAddress,

    /// Number of blocks managed by the block allocator.
    pub allocator_total_blocks: u32,

    /// Number of blocks in use at handoff time.
    pub allocator_used_blocks: u32,

    /// ACPI RSDT physical address, as reported by the boot loader.
    pub rsdt_address: PhysicalAddress,
}

const _: () = {
    assert!(size_of::<KernelParams>() == 24);
    assert!(offset_of!(KernelParams, kernel_stack) == 0);
    assert!(offset_of!(KernelParams, kernel_heap) == 4);
    assert!(offset_of!(KernelParams, kernel_memory_bitmap) == 8);
    assert!(offset_of!(KernelParams, allocator_total_blocks) == 12);
    assert!(offset_of!(KernelParams, allocator_used_blocks) == 16);
    assert!(offset_of!(KernelParams, rsdt_address) == 20);
};

impl KernelParams {
    /// An all-zero parameter block.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            kernel_stack: VirtualAddress::new(0),
            kernel_heap: VirtualAddress::new(0),
            kernel_memory_bitmap: VirtualAddress::new(0),
            allocator_total_blocks: 0,
            allocator_used_blocks: 0,
            rsdt_address: PhysicalAddress::zero(),
        }
    }
}

/// Where the kernel image lives, as known from linker symbols.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct KernelImage {
    /// First physical byte past the kernel image (`.bss` included).
    pub kernel_end: PhysicalAddress,

    /// Top of the boot stack (virtual, i.e. after paging).
    pub stack_top: VirtualAddress,
}

impl KernelImage {
    /// The kernel end, as seen through the higher-half alias.
    #[inline]
    #[must_use]
    pub const fn kernel_end_virtual(&self) -> VirtualAddress {
        physical_to_virtual(self.kernel_end)
    }
}
