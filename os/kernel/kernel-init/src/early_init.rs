use crate::boot_source::{BootInfoSource, MemoryMap};
use crate::paging::Paging;
use kernel_alloc::{AllocError, BlockAllocator, PhysMapper, init_allocator};
use kernel_info::boot::{KernelImage, KernelParams};
use kernel_info::memory::physical_to_virtual;
use kernel_multiboot::MultibootError;
use log::{debug, info, warn};

/// Name printed in the boot banner.
pub const KERNEL_NAME: &str = "missy";

/// Version printed in the boot banner.
pub const KERNEL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Conditions that stop the boot.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum EarlyInitError {
    #[error("multiboot data format could not be determined: {0}")]
    Multiboot(#[from] MultibootError),
    #[error("the boot loader passed no memory map")]
    MissingMemoryMap,
    #[error("could not retrieve the RSDT pointer from multiboot data")]
    RsdtMissing,
    #[error("could not find ACPI information")]
    RsdpMissing,
    #[error("block allocator: {0}")]
    Alloc(#[from] AllocError),
}

/// Log the boot banner.
pub fn early_welcome_message() {
    info!("{KERNEL_NAME} kernel {KERNEL_VERSION}");
    if cfg!(debug_assertions) {
        info!("this is a debug build, debugging output will be shown");
    }
}

/// Bring up the block allocator and paging.
///
/// `boot` is invoked after the banner and must validate the multiboot
/// handoff. A missing RSDP is logged and otherwise ignored.
///
/// # Errors
/// - [`EarlyInitError::Multiboot`] if `boot` fails.
/// - [`EarlyInitError::MissingMemoryMap`] without a memory map.
/// - [`EarlyInitError::Alloc`] without usable memory above the kernel.
///
/// # Safety
/// See [`init_allocator`]: the memory map must describe the machine and the
/// bitmap location must be reachable through `mapper` for `'a`.
pub unsafe fn kernel_early_init<'a, B, M, P>(
    boot: impl FnOnce() -> Result<B, MultibootError>,
    image: &KernelImage,
    mapper: &M,
    paging: &mut P,
) -> Result<BlockAllocator<'a>, EarlyInitError>
where
    B: BootInfoSource,
    M: PhysMapper + ?Sized,
    P: Paging + ?Sized,
{
    early_welcome_message();
    let boot = boot()?;

    if boot.rsdp().is_none() {
        warn!("Could not find ACPI information, continuing without it");
    }

    // SAFETY: Forwarded to the caller.
    unsafe { bring_up_memory(&boot, image, mapper, paging) }
}

/// Like [`kernel_early_init`], but insists on ACPI and fills `params`.
///
/// `params` is only written after paging is live, and then in full.
///
/// # Errors
/// Everything [`kernel_early_init`] reports, plus
/// [`EarlyInitError::RsdtMissing`] and [`EarlyInitError::RsdpMissing`].
///
/// # Safety
/// See [`kernel_early_init`].
pub unsafe fn kernel_early_init_with_params<'a, B, M, P>(
    boot: impl FnOnce() -> Result<B, MultibootError>,
    image: &KernelImage,
    mapper: &M,
    paging: &mut P,
    params: &mut KernelParams,
) -> Result<BlockAllocator<'a>, EarlyInitError>
where
    B: BootInfoSource,
    M: PhysMapper + ?Sized,
    P: Paging + ?Sized,
{
    early_welcome_message();
    let boot = boot()?;

    let rsdt_address = boot.rsdt_address().ok_or(EarlyInitError::RsdtMissing)?;
    let Some(rsdp) = boot.rsdp() else {
        warn!("Could not find ACPI information");
        return Err(EarlyInitError::RsdpMissing);
    };
    debug!("ACPI revision {} from {:?}", rsdp.revision(), rsdp.oem_id());

    // SAFETY: Forwarded to the caller.
    let blocks = unsafe { bring_up_memory(&boot, image, mapper, paging) }?;

    *params = KernelParams::zeroed();
    params.kernel_stack = image.stack_top;
    params.kernel_heap = image.kernel_end_virtual();
    params.kernel_memory_bitmap = physical_to_virtual(blocks.bitmap_address());
    params.allocator_total_blocks = blocks.total_blocks();
    params.allocator_used_blocks = blocks.used_blocks();
    params.rsdt_address = rsdt_address;

    log_params(params);
    Ok(blocks)
}

/// Allocator first, then paging. The bitmap is set up through physical
/// addresses before paging is switched on.
unsafe fn bring_up_memory<'a, B, M, P>(
    boot: &B,
    image: &KernelImage,
    mapper: &M,
    paging: &mut P,
) -> Result<BlockAllocator<'a>, EarlyInitError>
where
    B: BootInfoSource,
    M: PhysMapper + ?Sized,
    P: Paging + ?Sized,
{
    if let Some(name) = boot.boot_loader_name() {
        info!("Booted by {name}");
    }
    if let Some(cmdline) = boot.command_line().filter(|c| !c.is_empty()) {
        info!("Command line: {cmdline}");
    }

    let map = boot
        .memory_regions()
        .map(MemoryMap::from_regions)
        .ok_or(EarlyInitError::MissingMemoryMap)?;
    for region in map.as_slice() {
        debug!(
            "  {:#012x}..{:#012x} {}",
            region.base,
            region.end(),
            region.kind.as_str()
        );
    }

    // SAFETY: Forwarded to the caller.
    let blocks = unsafe { init_allocator(image.kernel_end, map.as_slice(), mapper) }?;
    paging.setup_paging();
    Ok(blocks)
}

fn log_params(params: &KernelParams) {
    info!("kparams struct:");
    info!("kernel_stack - {}", params.kernel_stack);
    info!("kernel_heap - {}", params.kernel_heap);
    info!("kernel_memory_bitmap - {}", params.kernel_memory_bitmap);
    info!("kernel memory total blocks: {}", params.allocator_total_blocks);
    info!("kernel memory used blocks: {}", params.allocator_used_blocks);
    info!("rsdt_address - {}", params.rsdt_address);
}
