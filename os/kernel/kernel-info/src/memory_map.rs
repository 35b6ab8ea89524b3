//! # Physical Memory Map
//!
//! The boot loader's view of physical memory, reduced to what the block
//! allocator needs: where RAM is, and whether it may be handed out.

/// Upper bound of the 32-bit physical address space.
pub const PHYSICAL_LIMIT: u64 = 1 << 32;

/// Classification of a physical memory region.
///
/// Mirrors the multiboot2 memory map entry types 1–5. Unknown types are mapped
/// to [`MemoryRegionKind::Reserved`].
#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MemoryRegionKind {
    /// RAM that is free for use.
    Available = 1,
    /// Firmware or device memory; never touch.
    Reserved = 2,
    /// ACPI tables; reclaimable once ACPI has been parsed.
    AcpiReclaimable = 3,
    /// ACPI non-volatile storage; must be preserved across sleep states.
    AcpiNvs = 4,
    /// RAM reported as defective.
    Defective = 5,
}

impl MemoryRegionKind {
    /// Map a raw multiboot2 memory type to a region kind.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Available,
            3 => Self::AcpiReclaimable,
            4 => Self::AcpiNvs,
            5 => Self::Defective,
            _ => Self::Reserved,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Available)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Reserved => "reserved",
            Self::AcpiReclaimable => "ACPI reclaimable",
            Self::AcpiNvs => "ACPI NVS",
            Self::Defective => "defective",
        }
    }
}

/// One entry of the physical memory map.
///
/// Base and length are 64-bit because that is what the boot loader reports;
/// [`MemoryRegion::end_clipped`] clamps them to the 32-bit address space.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryRegion {
    pub base: u64,
    pub length: u64,
    pub kind: MemoryRegionKind,
}

impl MemoryRegion {
    #[must_use]
    pub const fn new(base: u64, length: u64, kind: MemoryRegionKind) -> Self {
        Self { base, length, kind }
    }

    #[must_use]
    pub const fn available(base: u64, length: u64) -> Self {
        Self::new(base, length, MemoryRegionKind::Available)
    }

    #[must_use]
    pub const fn reserved(base: u64, length: u64) -> Self {
        Self::new(base, length, MemoryRegionKind::Reserved)
    }

    /// Exclusive end address, saturating on overflow.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base.saturating_add(self.length)
    }

    /// Exclusive end address, clamped to [`PHYSICAL_LIMIT`].
    #[inline]
    #[must_use]
    pub const fn end_clipped(&self) -> u64 {
        let end = self.end();
        if end > PHYSICAL_LIMIT {
            PHYSICAL_LIMIT
        } else {
            end
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        self.kind.is_usable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_types_are_reserved() {
        assert_eq!(MemoryRegionKind::from_raw(0), MemoryRegionKind::Reserved);
        assert_eq!(MemoryRegionKind::from_raw(7), MemoryRegionKind::Reserved);
        assert_eq!(MemoryRegionKind::from_raw(1), MemoryRegionKind::Available);
    }

    #[test]
    fn end_is_clipped_to_four_gib() {
        let high = MemoryRegion::available(0xFFFF_0000, 0x2_0000);
        assert_eq!(high.end(), 0x1_0001_0000);
        assert_eq!(high.end_clipped(), PHYSICAL_LIMIT);
    }
}
