//! # Physical Block Allocator
//!
//! A first-fit bitmap allocator over 4 KiB physical blocks.
//!
//! ## Layout
//!
//! ```text
//! kernel end (aligned up)                                  top of usable RAM
//! │                                                                        │
//! ▼                                                                        ▼
//! ┌──────────┬────────────────────────────────────────────────────────────┐
//! │  bitmap  │  blocks handed out by alloc / alloc_s                      │
//! └──────────┴────────────────────────────────────────────────────────────┘
//!  block 0    block bitmap_blocks ...                       block tracked-1
//! ```
//!
//! The tracked range starts at the 4 KiB-aligned end of the kernel image and
//! ends at the top of the highest usable memory region. Blocks inside that
//! range which the memory map does not report as available start out used.
//!
//! The blocks holding the bitmap are set in the bitmap but are not part of
//! [`BlockAllocator::total_blocks`]. After every operation
//! `free_blocks() + used_blocks() == total_blocks()` holds.

use crate::bitmap::BlockBitmap;
use crate::phys_mapper::PhysMapper;
use kernel_info::memory_map::{MemoryRegion, PHYSICAL_LIMIT};
use kernel_memory_addresses::{BLOCK_SIZE, PhysicalAddress, blocks_for_bytes};
use log::{debug, info};

/// Error code reported for out-of-memory conditions.
pub const ENOMEM: u32 = 0x01;

const BLOCK: u64 = BLOCK_SIZE as u64;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum AllocError {
    /// No usable memory lies above the kernel image, or the bitmap does not fit into it.
    #[error("no usable memory above the kernel image")]
    NoMemory,
    /// The storage handed to [`BlockAllocator::new`] cannot hold the bitmap.
    #[error("bitmap storage too small: {needed} words required, {provided} provided")]
    StorageTooSmall { needed: usize, provided: usize },
}

impl AllocError {
    /// Numeric error code of this error.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::NoMemory | Self::StorageTooSmall { .. } => ENOMEM,
        }
    }
}

/// Where the tracked range and its bitmap live.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BitmapLayout {
    base: PhysicalAddress,
    tracked_blocks: u32,
    bitmap_block: u32,
    bitmap_blocks: u32,
}

impl BitmapLayout {
    /// Plan the tracked range and bitmap placement for a memory map.
    ///
    /// The bitmap goes into the lowest run of available blocks above
    /// `kernel_end` that is large enough to hold it.
    ///
    /// # Errors
    /// [`AllocError::NoMemory`] if no usable memory lies above `kernel_end`,
    /// or no available run can hold the bitmap.
    pub fn plan(kernel_end: PhysicalAddress, map: &[MemoryRegion]) -> Result<Self, AllocError> {
        let base = kernel_end.align_up(BLOCK_SIZE).ok_or(AllocError::NoMemory)?;

        let top = map
            .iter()
            .filter(|r| r.is_usable() && r.base < PHYSICAL_LIMIT)
            .map(|r| align_down(r.end_clipped()))
            .max()
            .unwrap_or(0);

        let base_u64 = u64::from(base.as_u32());
        if top <= base_u64 {
            return Err(AllocError::NoMemory);
        }

        #[allow(clippy::cast_possible_truncation)]
        let tracked_blocks = ((top - base_u64) / BLOCK) as u32;
        let bitmap_bytes = BlockBitmap::words_for(tracked_blocks) * size_of::<u32>();
        #[allow(clippy::cast_possible_truncation)]
        let bitmap_blocks = blocks_for_bytes(bitmap_bytes as u32);

        let bitmap_block = find_available_run(map, base_u64, tracked_blocks, bitmap_blocks)
            .ok_or(AllocError::NoMemory)?;

        Ok(Self {
            base,
            tracked_blocks,
            bitmap_block,
            bitmap_blocks,
        })
    }

    /// First tracked address; the aligned end of the kernel image.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> PhysicalAddress {
        self.base
    }

    /// Number of blocks between [`base`](Self::base) and the top of usable memory.
    #[inline]
    #[must_use]
    pub const fn tracked_blocks(&self) -> u32 {
        self.tracked_blocks
    }

    /// Number of blocks occupied by the bitmap.
    #[inline]
    #[must_use]
    pub const fn bitmap_blocks(&self) -> u32 {
        self.bitmap_blocks
    }

    /// Number of 32-bit words of bitmap storage.
    #[inline]
    #[must_use]
    pub const fn bitmap_words(&self) -> usize {
        BlockBitmap::words_for(self.tracked_blocks)
    }

    /// Physical address of the bitmap.
    #[inline]
    #[must_use]
    pub const fn bitmap_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.base.as_u32() + self.bitmap_block * BLOCK_SIZE)
    }
}

/// Bitmap-backed allocator for 4 KiB physical blocks.
pub struct BlockAllocator<'a> {
    layout: BitmapLayout,
    bitmap: BlockBitmap<'a>,
    total_blocks: u32,
    free_blocks: u32,
    used_blocks: u32,
}

impl<'a> BlockAllocator<'a> {
    /// Build the allocator over `storage`, marking blocks according to `map`.
    ///
    /// # Errors
    /// [`AllocError::StorageTooSmall`] if `storage` has fewer than
    /// [`BitmapLayout::bitmap_words`] words.
    pub fn new(
        layout: BitmapLayout,
        storage: &'a mut [u32],
        map: &[MemoryRegion],
    ) -> Result<Self, AllocError> {
        let needed = layout.bitmap_words();
        let provided = storage.len();
        let mut bitmap = BlockBitmap::new_all_used(storage, layout.tracked_blocks)
            .ok_or(AllocError::StorageTooSmall { needed, provided })?;

        let base = u64::from(layout.base.as_u32());
        let tracked = layout.tracked_blocks;

        // Open up what the map calls available, shrinking each region to whole blocks.
        for region in map.iter().filter(|r| r.is_usable()) {
            let start = align_up(region.base);
            let end = align_down(region.end_clipped());
            if let Some((first, last)) = block_span(base, tracked, start, end) {
                bitmap.clear_range(first, last);
            }
        }

        // Anything else overlapping a block wins, growing each region to whole blocks.
        for region in map.iter().filter(|r| !r.is_usable()) {
            let start = align_down(region.base);
            let end = align_up(region.end_clipped());
            if let Some((first, last)) = block_span(base, tracked, start, end) {
                bitmap.set_range(first, last);
            }
        }

        bitmap.set_range(layout.bitmap_block, layout.bitmap_block + layout.bitmap_blocks);

        let total_blocks = tracked - layout.bitmap_blocks;
        let free_blocks = bitmap.count_clear();
        let used_blocks = total_blocks - free_blocks;

        info!(
            "Block allocator: {total_blocks} blocks from {} ({free_blocks} free, {used_blocks} used), bitmap at {}",
            layout.base,
            layout.bitmap_address()
        );

        Ok(Self {
            layout,
            bitmap,
            total_blocks,
            free_blocks,
            used_blocks,
        })
    }

    /// Number of blocks under management, excluding the bitmap's own blocks.
    #[inline]
    #[must_use]
    pub const fn total_blocks(&self) -> u32 {
        self.total_blocks
    }

    #[inline]
    #[must_use]
    pub const fn free_blocks(&self) -> u32 {
        self.free_blocks
    }

    #[inline]
    #[must_use]
    pub const fn used_blocks(&self) -> u32 {
        self.used_blocks
    }

    /// First usable physical address above the kernel image.
    #[inline]
    #[must_use]
    pub const fn kernel_end(&self) -> PhysicalAddress {
        self.layout.base
    }

    /// Physical address of the bitmap.
    #[inline]
    #[must_use]
    pub const fn bitmap_address(&self) -> PhysicalAddress {
        self.layout.bitmap_address()
    }

    #[inline]
    #[must_use]
    pub const fn layout(&self) -> &BitmapLayout {
        &self.layout
    }

    /// Whether the block containing `addr` is in use.
    ///
    /// Addresses outside the tracked range report `true`.
    #[must_use]
    pub fn is_allocated(&self, addr: PhysicalAddress) -> bool {
        self.block_of(addr).is_none_or(|block| self.bitmap.is_set(block))
    }

    /// Allocate a single block.
    ///
    /// Returns `None` exactly when [`free_blocks`](Self::free_blocks) is zero.
    pub fn alloc(&mut self) -> Option<PhysicalAddress> {
        let block = self.bitmap.first_clear()?;
        self.bitmap.set(block);
        self.free_blocks -= 1;
        self.used_blocks += 1;
        Some(self.address_of(block))
    }

    /// Release a single block.
    ///
    /// Addresses outside the tracked range and the bitmap's own blocks are
    /// ignored.
    ///
    /// # Safety
    /// `addr` must have been returned by [`alloc`](Self::alloc) (or be part of
    /// a run from [`alloc_s`](Self::alloc_s)) and must not be in use anymore.
    /// Double frees are not detected.
    pub unsafe fn free(&mut self, addr: PhysicalAddress) {
        if let Some(block) = self.block_of(addr) {
            self.release(block);
        }
    }

    /// Allocate `count` physically contiguous blocks, first fit.
    ///
    /// Returns `None` for `count == 0` or when no large enough run is free.
    pub fn alloc_s(&mut self, count: u32) -> Option<PhysicalAddress> {
        if count == 0 || count > self.free_blocks {
            return None;
        }

        let first = self.bitmap.first_clear_run(count)?;
        self.bitmap.set_range(first, first + count);
        self.free_blocks -= count;
        self.used_blocks += count;

        let addr = self.address_of(first);
        debug!("Allocated {count} contiguous blocks at {addr}");
        Some(addr)
    }

    /// Release `count` contiguous blocks starting at `addr`.
    ///
    /// # Safety
    /// `addr` and `count` must match a previous [`alloc_s`](Self::alloc_s)
    /// call. Run lengths are not recorded, so a mismatched count frees blocks
    /// that may still be in use.
    pub unsafe fn free_s(&mut self, addr: PhysicalAddress, count: u32) {
        let Some(first) = self.block_of(addr) else {
            return;
        };
        let last = first.saturating_add(count).min(self.layout.tracked_blocks);
        for block in first..last {
            self.release(block);
        }
    }

    fn release(&mut self, block: u32) {
        let bitmap_start = self.layout.bitmap_block;
        if (bitmap_start..bitmap_start + self.layout.bitmap_blocks).contains(&block) {
            return;
        }
        if self.bitmap.is_set(block) {
            self.bitmap.clear(block);
            self.free_blocks += 1;
            self.used_blocks -= 1;
        }
    }

    fn block_of(&self, addr: PhysicalAddress) -> Option<u32> {
        let offset = addr.as_u32().checked_sub(self.layout.base.as_u32())?;
        let block = offset / BLOCK_SIZE;
        (block < self.layout.tracked_blocks).then_some(block)
    }

    const fn address_of(&self, block: u32) -> PhysicalAddress {
        PhysicalAddress::new(self.layout.base.as_u32() + block * BLOCK_SIZE)
    }
}

/// Plan the layout, map the bitmap through `mapper` and build the allocator.
///
/// # Errors
/// [`AllocError::NoMemory`] if no usable memory lies above `kernel_end`.
///
/// # Safety
/// The memory map must describe the machine, and the bitmap range chosen by
/// [`BitmapLayout::plan`] must be reachable through `mapper` and unused by
/// anything else for `'a`.
pub unsafe fn init_allocator<'a, M: PhysMapper + ?Sized>(
    kernel_end: PhysicalAddress,
    map: &[MemoryRegion],
    mapper: &M,
) -> Result<BlockAllocator<'a>, AllocError> {
    let layout = BitmapLayout::plan(kernel_end, map)?;
    debug!(
        "Tracking {} blocks above {}, bitmap needs {} block(s)",
        layout.tracked_blocks, layout.base, layout.bitmap_blocks
    );

    // SAFETY: Caller guarantees the planned bitmap range is mapped RAM owned by us.
    let storage = unsafe { mapper.words_mut(layout.bitmap_address(), layout.bitmap_words()) };
    BlockAllocator::new(layout, storage, map)
}

#[inline]
const fn align_down(addr: u64) -> u64 {
    addr & !(BLOCK - 1)
}

#[inline]
const fn align_up(addr: u64) -> u64 {
    align_down(addr.saturating_add(BLOCK - 1))
}

/// Tracked block indices `[first, last)` covering `[start, end)`, if any.
fn block_span(base: u64, tracked: u32, start: u64, end: u64) -> Option<(u32, u32)> {
    let start = start.max(base);
    let end = end.min(base + u64::from(tracked) * BLOCK);
    if start >= end {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    Some((((start - base) / BLOCK) as u32, ((end - base) / BLOCK) as u32))
}

/// Whether the block at `addr` is fully available and overlaps nothing else.
fn block_is_available(map: &[MemoryRegion], addr: u64) -> bool {
    let end = addr + BLOCK;
    let inside = map
        .iter()
        .any(|r| r.is_usable() && r.base <= addr && end <= r.end_clipped());
    let clobbered = map
        .iter()
        .any(|r| !r.is_usable() && r.base < end && addr < r.end_clipped());
    inside && !clobbered
}

fn find_available_run(map: &[MemoryRegion], base: u64, tracked: u32, count: u32) -> Option<u32> {
    let mut run = 0;
    for block in 0..tracked {
        let addr = base + u64::from(block) * BLOCK;
        if addr + BLOCK > PHYSICAL_LIMIT {
            break;
        }
        if block_is_available(map, addr) {
            run += 1;
            if run == count {
                return Some(block + 1 - count);
            }
        } else {
            run = 0;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn plan_reference_layout() {
        let map = [MemoryRegion::available(MIB, 16 * MIB)];
        let layout = BitmapLayout::plan(PhysicalAddress::new(0x20_0000), &map).unwrap();
        assert_eq!(layout.tracked_blocks(), 3840);
        assert_eq!(layout.bitmap_blocks(), 1);
        assert_eq!(layout.bitmap_words(), 120);
        assert_eq!(layout.bitmap_address(), PhysicalAddress::new(0x20_0000));
    }

    #[test]
    fn plan_aligns_kernel_end_up() {
        let map = [MemoryRegion::available(MIB, 16 * MIB)];
        let layout = BitmapLayout::plan(PhysicalAddress::new(0x20_0123), &map).unwrap();
        assert_eq!(layout.base(), PhysicalAddress::new(0x20_1000));
        assert_eq!(layout.tracked_blocks(), 3839);
    }

    #[test]
    fn plan_skips_reserved_hole_for_the_bitmap() {
        let map = [
            MemoryRegion::available(MIB, 16 * MIB),
            MemoryRegion::reserved(2 * MIB, 0x2000),
        ];
        let layout = BitmapLayout::plan(PhysicalAddress::new(0x20_0000), &map).unwrap();
        assert_eq!(layout.bitmap_address(), PhysicalAddress::new(0x20_2000));
    }

    #[test]
    fn plan_fails_without_memory_above_kernel() {
        let map = [MemoryRegion::available(0, 0x9_F000), MemoryRegion::available(MIB, MIB)];
        assert_eq!(
            BitmapLayout::plan(PhysicalAddress::new(0x20_0000), &map),
            Err(AllocError::NoMemory)
        );
        assert_eq!(BitmapLayout::plan(PhysicalAddress::new(0x20_0000), &[]), Err(AllocError::NoMemory));
    }

    #[test]
    fn plan_fails_if_only_reserved_memory_is_above_kernel() {
        let map = [
            MemoryRegion::available(MIB, MIB),
            MemoryRegion::reserved(2 * MIB, 8 * MIB),
        ];
        assert_eq!(
            BitmapLayout::plan(PhysicalAddress::new(0x20_0000), &map),
            Err(AllocError::NoMemory)
        );
    }

    #[test]
    fn plan_fails_when_kernel_end_cannot_be_aligned() {
        let map = [MemoryRegion::available(0, PHYSICAL_LIMIT)];
        assert_eq!(
            BitmapLayout::plan(PhysicalAddress::new(0xFFFF_F001), &map),
            Err(AllocError::NoMemory)
        );
    }

    #[test]
    fn error_code_is_enomem() {
        assert_eq!(AllocError::NoMemory.code(), 0x01);
        assert_eq!(
            AllocError::StorageTooSmall { needed: 2, provided: 1 }.code(),
            ENOMEM
        );
    }

    #[test]
    fn new_rejects_short_storage() {
        let map = [MemoryRegion::available(MIB, 16 * MIB)];
        let layout = BitmapLayout::plan(PhysicalAddress::new(0x20_0000), &map).unwrap();
        let mut storage = [0u32; 10];
        assert_eq!(
            BlockAllocator::new(layout, &mut storage, &map).err(),
            Some(AllocError::StorageTooSmall { needed: 120, provided: 10 })
        );
    }
}
