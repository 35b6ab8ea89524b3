use kernel_acpi::Rsdp;
use kernel_info::memory_map::MemoryRegion;
use kernel_memory_addresses::PhysicalAddress;
use kernel_multiboot::BootInformation;
use log::warn;

/// Upper bound on memory map entries kept during early init.
pub const MAX_MEMORY_REGIONS: usize = 32;

/// What early init reads from the boot loader.
pub trait BootInfoSource {
    /// The physical memory map, if the loader passed one.
    fn memory_regions(&self) -> Option<impl Iterator<Item = MemoryRegion> + '_>;

    /// A validated RSDP copy.
    fn rsdp(&self) -> Option<Rsdp>;

    /// Physical address of the RSDT.
    fn rsdt_address(&self) -> Option<PhysicalAddress>;

    fn boot_loader_name(&self) -> Option<&str> {
        None
    }

    fn command_line(&self) -> Option<&str> {
        None
    }
}

impl BootInfoSource for BootInformation<'_> {
    fn memory_regions(&self) -> Option<impl Iterator<Item = MemoryRegion> + '_> {
        BootInformation::memory_regions(self)
    }

    fn rsdp(&self) -> Option<Rsdp> {
        BootInformation::rsdp(self)
    }

    fn rsdt_address(&self) -> Option<PhysicalAddress> {
        BootInformation::rsdt_address(self)
    }

    fn boot_loader_name(&self) -> Option<&str> {
        BootInformation::boot_loader_name(self)
    }

    fn command_line(&self) -> Option<&str> {
        BootInformation::command_line(self)
    }
}

/// A fixed-capacity copy of the memory map, so the allocator can be built
/// without a heap.
#[derive(Debug, Clone)]
pub struct MemoryMap {
    regions: [MemoryRegion; MAX_MEMORY_REGIONS],
    len: usize,
}

impl MemoryMap {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: [MemoryRegion::reserved(0, 0); MAX_MEMORY_REGIONS],
            len: 0,
        }
    }

    /// Copy `regions`, dropping (and logging) whatever exceeds the capacity.
    pub fn from_regions(regions: impl IntoIterator<Item = MemoryRegion>) -> Self {
        let mut map = Self::new();
        let mut dropped = 0usize;
        for region in regions {
            if !map.push(region) {
                dropped += 1;
            }
        }
        if dropped > 0 {
            warn!("Memory map truncated, {dropped} region(s) past the first {MAX_MEMORY_REGIONS} ignored");
        }
        map
    }

    /// Append a region; `false` if the map is full.
    pub fn push(&mut self, region: MemoryRegion) -> bool {
        let Some(slot) = self.regions.get_mut(self.len) else {
            return false;
        };
        *slot = region;
        self.len += 1;
        true
    }

    #[must_use]
    pub fn as_slice(&self) -> &[MemoryRegion] {
        &self.regions[..self.len]
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_order() {
        let map = MemoryMap::from_regions([
            MemoryRegion::reserved(0, 0x1000),
            MemoryRegion::available(0x10_0000, 0x100_0000),
        ]);
        assert_eq!(map.len(), 2);
        assert_eq!(map.as_slice()[1].base, 0x10_0000);
    }

    #[test]
    fn overflow_is_truncated() {
        let map = MemoryMap::from_regions(
            (0..MAX_MEMORY_REGIONS as u64 + 5).map(|i| MemoryRegion::available(i << 20, 1 << 20)),
        );
        assert_eq!(map.len(), MAX_MEMORY_REGIONS);
        assert_eq!(
            map.as_slice().last().map(|r| r.base),
            Some((MAX_MEMORY_REGIONS as u64 - 1) << 20)
        );
    }

    #[test]
    fn empty_by_default() {
        assert!(MemoryMap::default().is_empty());
    }
}
