//! Memory map tag (type 6).
//!
//! ```text
//! u32 entry_size   (24 or larger)
//! u32 entry_version
//! entries: u64 base, u64 length, u32 type, u32 reserved
//! ```

use crate::{read_u32, read_u64};
use kernel_info::memory_map::{MemoryRegion, MemoryRegionKind};

const MMAP_HEADER_SIZE: usize = 8;
const MIN_ENTRY_SIZE: usize = 24;

/// Iterator over the memory map entries.
#[derive(Debug, Clone)]
pub struct MemoryRegions<'a> {
    entries: &'a [u8],
    entry_size: usize,
}

impl<'a> MemoryRegions<'a> {
    /// Returns `None` for a payload too short for its header or with an entry
    /// size below the 24 bytes every entry needs.
    pub(crate) fn new(payload: &'a [u8]) -> Option<Self> {
        if payload.len() < MMAP_HEADER_SIZE {
            return None;
        }
        let entry_size = read_u32(payload, 0) as usize;
        if entry_size < MIN_ENTRY_SIZE {
            return None;
        }
        Some(Self {
            entries: &payload[MMAP_HEADER_SIZE..],
            entry_size,
        })
    }
}

impl Iterator for MemoryRegions<'_> {
    type Item = MemoryRegion;

    fn next(&mut self) -> Option<Self::Item> {
        if self.entries.len() < self.entry_size {
            return None;
        }
        let (entry, rest) = self.entries.split_at(self.entry_size);
        self.entries = rest;

        Some(MemoryRegion::new(
            read_u64(entry, 0),
            read_u64(entry, 8),
            MemoryRegionKind::from_raw(read_u32(entry, 16)),
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.entries.len() / self.entry_size;
        (n, Some(n))
    }
}

impl ExactSizeIterator for MemoryRegions<'_> {}
