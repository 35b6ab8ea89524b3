//! # Memory Layout

use kernel_memory_addresses::{BLOCK_SIZE, PhysicalAddress, VirtualAddress};

/// Where the kernel's higher-half alias of physical memory begins.
///
/// Once paging is live, physical address `pa` is reachable at
/// `KERNEL_VIRTUAL_BASE + pa` for every `pa` below [`HIGHER_HALF_BYTES`].
pub const KERNEL_VIRTUAL_BASE: u32 = 0xC000_0000;

/// Amount of physical memory covered by the higher-half alias.
pub const HIGHER_HALF_BYTES: u32 = 0u32.wrapping_sub(KERNEL_VIRTUAL_BASE);

/// Where the boot loader places the kernel image in *physical* memory.
///
/// # Kernel Build
/// This information is sourced in the kernel's `build.rs` to configure
/// the linker.
pub const PHYS_LOAD: u32 = 0x0010_0000; // 1 MiB

/// Size of the kernel boot stack.
#[cfg(debug_assertions)]
pub const KERNEL_STACK_SIZE: usize = 32 * 1024;

/// Size of the kernel boot stack.
#[cfg(not(debug_assertions))]
pub const KERNEL_STACK_SIZE: usize = 16 * 1024;

const _: () = {
    assert!(KERNEL_STACK_SIZE.is_multiple_of(BLOCK_SIZE as usize));
    assert!(PHYS_LOAD.is_multiple_of(BLOCK_SIZE));
    assert!(KERNEL_VIRTUAL_BASE.is_multiple_of(4 * 1024 * 1024));
    assert!(HIGHER_HALF_BYTES == 0x4000_0000);
};

/// Translate a physical address into its higher-half alias.
///
/// Only valid to dereference after paging has been enabled, and only for
/// physical addresses below [`HIGHER_HALF_BYTES`].
#[inline]
#[must_use]
pub const fn physical_to_virtual(pa: PhysicalAddress) -> VirtualAddress {
    VirtualAddress::new(pa.as_u32().wrapping_add(KERNEL_VIRTUAL_BASE))
}

/// Inverse of [`physical_to_virtual`] for addresses inside the alias window.
///
/// Returns `None` for virtual addresses below [`KERNEL_VIRTUAL_BASE`].
#[inline]
#[must_use]
pub const fn virtual_to_physical(va: VirtualAddress) -> Option<PhysicalAddress> {
    match va.as_u32().checked_sub(KERNEL_VIRTUAL_BASE) {
        Some(pa) => Some(PhysicalAddress::new(pa)),
        None => None,
    }
}
