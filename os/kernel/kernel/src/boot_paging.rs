//! # Boot-time Paging
//!
//! One page directory of 4 MiB (PSE) pages, no page tables:
//!
//! ```text
//! PDE 0..256     → physical [0, 1 GiB)   identity, the kernel runs here
//! PDE 768..1024  → physical [0, 1 GiB)   alias at KERNEL_VIRTUAL_BASE
//! ```

use bitfield_struct::bitfield;
use kernel_info::memory::{HIGHER_HALF_BYTES, KERNEL_VIRTUAL_BASE};
use kernel_init::Paging;
use kernel_memory_addresses::PhysicalAddress;
use log::info;

/// Entries in a page directory.
pub const DIRECTORY_ENTRIES: usize = 1024;

/// Bytes mapped by one directory entry with the PS bit set.
pub const LARGE_PAGE_SIZE: u32 = 4 * 1024 * 1024;

const LARGE_PAGE_SHIFT: u32 = 22;

/// Directory entries covered by the higher-half alias.
pub const ALIAS_ENTRIES: usize = (HIGHER_HALF_BYTES / LARGE_PAGE_SIZE) as usize;

/// First directory entry of the higher-half alias.
pub const KERNEL_DIRECTORY_INDEX: usize = (KERNEL_VIRTUAL_BASE >> LARGE_PAGE_SHIFT) as usize;

const _: () = assert!(1 << LARGE_PAGE_SHIFT == LARGE_PAGE_SIZE);
const _: () = assert!(KERNEL_DIRECTORY_INDEX + ALIAS_ENTRIES == DIRECTORY_ENTRIES);

/// A page directory entry mapping a 4 MiB page (CR4.PSE).
///
/// Reference: Intel SDM Vol. 3A, Table 4-4.
#[bitfield(u32)]
pub struct LargePageEntry {
    pub present: bool, // 0
    pub writable: bool, // 1
    pub user: bool, // 2
    pub write_through: bool, // 3
    pub cache_disable: bool, // 4
    pub accessed: bool, // 5
    pub dirty: bool, // 6
    /// Must be set: this entry maps a 4 MiB page.
    pub page_size: bool, // 7
    pub global: bool, // 8
    #[bits(3)]
    pub available: u8, // 9-11
    pub pat: bool, // 12
    #[bits(9)]
    __: u16, // 13-21, upper address bits with PSE-36
    /// Physical address bits 31:22.
    #[bits(10)]
    pub frame: u16, // 22-31
}

impl LargePageEntry {
    /// Present, writable, supervisor-only 4 MiB page at `pa`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn kernel(pa: u32) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_page_size(true)
            .with_frame((pa >> LARGE_PAGE_SHIFT) as u16)
    }

    #[must_use]
    pub const fn address(self) -> u32 {
        (self.frame() as u32) << LARGE_PAGE_SHIFT
    }
}

#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [LargePageEntry; DIRECTORY_ENTRIES],
}

impl PageDirectory {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [LargePageEntry::new(); DIRECTORY_ENTRIES],
        }
    }

    /// Identity map and alias the first gigabyte.
    #[allow(clippy::cast_possible_truncation)]
    pub fn map_boot_layout(&mut self) {
        for i in 0..ALIAS_ENTRIES {
            let entry = LargePageEntry::kernel(i as u32 * LARGE_PAGE_SIZE);
            self.entries[i] = entry;
            self.entries[KERNEL_DIRECTORY_INDEX + i] = entry;
        }
    }

    #[must_use]
    pub const fn entry(&self, index: usize) -> LargePageEntry {
        self.entries[index]
    }

    /// Walk the directory like the MMU would.
    #[must_use]
    pub const fn translate(&self, va: u32) -> Option<u32> {
        let entry = self.entries[(va >> LARGE_PAGE_SHIFT) as usize];
        if !entry.present() {
            return None;
        }
        Some(entry.address() | (va & (LARGE_PAGE_SIZE - 1)))
    }
}

/// Builds the boot directory and switches paging on.
pub struct BootPaging {
    directory: &'static mut PageDirectory,
}

impl BootPaging {
    /// # Safety
    /// The kernel must run identity mapped inside the first gigabyte, and
    /// `directory` must be addressed physically.
    pub const unsafe fn new(directory: &'static mut PageDirectory) -> Self {
        Self { directory }
    }
}

impl Paging for BootPaging {
    fn setup_paging(&mut self) {
        self.directory.map_boot_layout();
        let directory = PhysicalAddress::from_ptr(core::ptr::from_ref(&*self.directory));

        // SAFETY: `new` guarantees the running code stays mapped 1:1.
        #[cfg(target_arch = "x86")]
        unsafe {
            enable_paging(directory);
        }

        info!(
            "Paging enabled, directory at {directory}, {} MiB identity mapped and aliased at {:#010x}",
            HIGHER_HALF_BYTES >> 20,
            KERNEL_VIRTUAL_BASE
        );
    }
}

/// Load CR3, enable 4 MiB pages and turn on CR0.PG.
#[cfg(target_arch = "x86")]
unsafe fn enable_paging(directory: PhysicalAddress) {
    const CR4_PSE: u32 = 1 << 4;
    const CR0_PG: u32 = 1 << 31;

    unsafe {
        core::arch::asm!(
            "mov {tmp}, cr4",
            "or {tmp}, {pse}",
            "mov cr4, {tmp}",
            "mov cr3, {pd}",
            "mov {tmp}, cr0",
            "or {tmp}, {pg}",
            "mov cr0, {tmp}",
            pd = in(reg) directory.as_u32(),
            tmp = out(reg) _,
            pse = const CR4_PSE,
            pg = const CR0_PG,
            options(nostack, preserves_flags),
        );
    }
}
