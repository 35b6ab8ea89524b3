use kernel_alloc::{
    AllocError, BitmapLayout, BlockAllocator, MemoryRegion, MemoryRegionKind, PhysMapper,
    init_allocator,
};
use kernel_memory_addresses::PhysicalAddress;

const MIB: u64 = 1024 * 1024;
const KERNEL_END: PhysicalAddress = PhysicalAddress::new(0x20_0000);

/// Hands out a host buffer for any physical address.
struct BufferMapper {
    ptr: *mut u32,
    len: usize,
}

impl BufferMapper {
    fn new(storage: &mut [u32]) -> Self {
        Self {
            ptr: storage.as_mut_ptr(),
            len: storage.len(),
        }
    }
}

impl PhysMapper for BufferMapper {
    unsafe fn words_mut<'a>(&self, _pa: PhysicalAddress, words: usize) -> &'a mut [u32] {
        assert!(words <= self.len, "test buffer too small");
        unsafe { core::slice::from_raw_parts_mut(self.ptr, words) }
    }
}

fn reference_map() -> [MemoryRegion; 1] {
    [MemoryRegion::available(MIB, 16 * MIB)]
}

fn with_allocator<R>(map: &[MemoryRegion], f: impl FnOnce(&mut BlockAllocator<'_>) -> R) -> R {
    let layout = BitmapLayout::plan(KERNEL_END, map).expect("layout");
    let mut storage = vec![0u32; layout.bitmap_words()];
    let mut blocks = BlockAllocator::new(layout, &mut storage, map).expect("allocator");
    f(&mut blocks)
}

fn assert_counts(blocks: &BlockAllocator<'_>) {
    assert_eq!(
        blocks.free_blocks() + blocks.used_blocks(),
        blocks.total_blocks()
    );
}

#[test]
fn reference_scenario() {
    let map = reference_map();
    let mut storage = vec![0u32; 256];
    let mapper = BufferMapper::new(&mut storage);
    let mut blocks = unsafe { init_allocator(KERNEL_END, &map, &mapper) }.expect("allocator");

    assert_eq!(blocks.layout().tracked_blocks(), 3840);
    assert_eq!(blocks.layout().bitmap_blocks(), 1);
    assert_eq!(blocks.total_blocks(), 3839);
    assert_eq!(blocks.free_blocks(), 3839);
    assert_eq!(blocks.used_blocks(), 0);
    assert_eq!(blocks.kernel_end(), KERNEL_END);
    assert_eq!(blocks.bitmap_address(), KERNEL_END);

    let first = blocks.alloc().unwrap();
    let second = blocks.alloc().unwrap();
    assert_eq!(first, PhysicalAddress::new(0x20_1000));
    assert_eq!(second, PhysicalAddress::new(0x20_2000));

    unsafe { blocks.free(first) };
    assert_eq!(blocks.alloc(), Some(first));
    assert_counts(&blocks);
}

#[test]
fn counts_stay_consistent_across_mixed_operations() {
    with_allocator(&reference_map(), |blocks| {
        let mut singles = Vec::new();
        for _ in 0..40 {
            singles.push(blocks.alloc().unwrap());
            assert_counts(blocks);
        }

        let run = blocks.alloc_s(17).unwrap();
        assert_counts(blocks);

        for addr in singles.iter().step_by(3) {
            unsafe { blocks.free(*addr) };
            assert_counts(blocks);
        }

        unsafe { blocks.free_s(run, 17) };
        assert_counts(blocks);
        assert_eq!(blocks.used_blocks(), 40 - 14);
    });
}

#[test]
fn alloc_is_none_exactly_when_nothing_is_free() {
    let map = [MemoryRegion::available(MIB, MIB + 0x10_0000)];
    with_allocator(&map, |blocks| {
        let mut count = 0;
        while blocks.free_blocks() > 0 {
            assert!(blocks.alloc().is_some());
            count += 1;
        }
        assert_eq!(count, blocks.total_blocks());
        assert_eq!(blocks.alloc(), None);
        assert_eq!(blocks.alloc_s(1), None);
        assert_counts(blocks);
    });
}

#[test]
fn run_round_trip_restores_state() {
    with_allocator(&reference_map(), |blocks| {
        let _a = blocks.alloc().unwrap();
        let free_before = blocks.free_blocks();
        let used_before = blocks.used_blocks();

        let run = blocks.alloc_s(8).unwrap();
        assert_eq!(run, PhysicalAddress::new(0x20_2000));
        assert_eq!(blocks.free_blocks(), free_before - 8);

        unsafe { blocks.free_s(run, 8) };
        assert_eq!(blocks.free_blocks(), free_before);
        assert_eq!(blocks.used_blocks(), used_before);
        assert_eq!(blocks.alloc_s(8), Some(run));
    });
}

#[test]
fn zero_length_run_is_rejected() {
    with_allocator(&reference_map(), |blocks| {
        assert_eq!(blocks.alloc_s(0), None);
        assert_eq!(blocks.used_blocks(), 0);
    });
}

#[test]
fn oversized_run_is_rejected() {
    with_allocator(&reference_map(), |blocks| {
        let total = blocks.total_blocks();
        assert_eq!(blocks.alloc_s(total + 1), None);
        assert!(blocks.alloc_s(total).is_some());
        assert_eq!(blocks.free_blocks(), 0);
    });
}

#[test]
fn runs_do_not_cross_reserved_holes() {
    let map = [
        MemoryRegion::available(MIB, 16 * MIB),
        MemoryRegion::reserved(0x20_4000, 0x1000),
    ];
    with_allocator(&map, |blocks| {
        assert_eq!(blocks.used_blocks(), 1);
        assert!(blocks.is_allocated(PhysicalAddress::new(0x20_4000)));

        // Blocks 1..=3 are free, block 4 is reserved.
        assert_eq!(blocks.alloc_s(4), Some(PhysicalAddress::new(0x20_5000)));
        assert_eq!(blocks.alloc_s(3), Some(PhysicalAddress::new(0x20_1000)));
        assert_counts(blocks);
    });
}

#[test]
fn unaligned_reserved_regions_cover_whole_blocks() {
    let map = [
        MemoryRegion::available(MIB, 16 * MIB),
        MemoryRegion::new(0x20_3800, 0x1000, MemoryRegionKind::AcpiNvs),
    ];
    with_allocator(&map, |blocks| {
        assert!(blocks.is_allocated(PhysicalAddress::new(0x20_3000)));
        assert!(blocks.is_allocated(PhysicalAddress::new(0x20_4000)));
        assert!(!blocks.is_allocated(PhysicalAddress::new(0x20_5000)));
        assert_eq!(blocks.used_blocks(), 2);
    });
}

#[test]
fn gaps_between_regions_count_as_used() {
    let map = [
        MemoryRegion::available(MIB, 3 * MIB),
        MemoryRegion::available(8 * MIB, 8 * MIB),
    ];
    with_allocator(&map, |blocks| {
        // Tracked: [2 MiB, 16 MiB) = 3584 blocks, 1 bitmap block.
        assert_eq!(blocks.total_blocks(), 3583);
        // Gap: [4 MiB, 8 MiB) = 1024 blocks.
        assert_eq!(blocks.used_blocks(), 1024);
        assert!(blocks.is_allocated(PhysicalAddress::new(0x50_0000)));
        assert_counts(blocks);
    });
}

#[test]
fn overlapping_reserved_region_wins_over_available() {
    let map = [
        MemoryRegion::reserved(0x30_0000, 0x10_0000),
        MemoryRegion::available(MIB, 16 * MIB),
    ];
    with_allocator(&map, |blocks| {
        assert_eq!(blocks.used_blocks(), 256);
        assert!(blocks.is_allocated(PhysicalAddress::new(0x30_0000)));
        assert!(blocks.is_allocated(PhysicalAddress::new(0x3F_F000)));
        assert!(!blocks.is_allocated(PhysicalAddress::new(0x40_0000)));
    });
}

#[test]
fn bitmap_blocks_cannot_be_freed() {
    with_allocator(&reference_map(), |blocks| {
        let bitmap = blocks.bitmap_address();
        unsafe { blocks.free(bitmap) };
        assert!(blocks.is_allocated(bitmap));
        assert_eq!(blocks.free_blocks(), blocks.total_blocks());
    });
}

#[test]
fn out_of_range_frees_are_ignored() {
    with_allocator(&reference_map(), |blocks| {
        let a = blocks.alloc().unwrap();
        unsafe {
            blocks.free(PhysicalAddress::new(0x10_0000));
            blocks.free(PhysicalAddress::new(0x1100_0000));
            blocks.free_s(PhysicalAddress::new(0x10_F000), 4);
        }
        assert_eq!(blocks.used_blocks(), 1);
        assert!(blocks.is_allocated(a));
    });
}

#[test]
fn freeing_a_free_block_leaves_counts_alone() {
    with_allocator(&reference_map(), |blocks| {
        let a = blocks.alloc().unwrap();
        unsafe {
            blocks.free(a);
            blocks.free(a);
        }
        assert_eq!(blocks.used_blocks(), 0);
        assert_counts(blocks);
    });
}

#[test]
fn memory_above_four_gib_is_clipped() {
    let map = [
        MemoryRegion::available(MIB, 16 * MIB),
        MemoryRegion::reserved(0xFFFC_0000, 0x4_0000),
        MemoryRegion::available(0x1_0000_0000, 0x1000_0000),
    ];
    let layout = BitmapLayout::plan(KERNEL_END, &map).unwrap();
    assert_eq!(layout.tracked_blocks(), 3840);
}

#[test]
fn init_fails_without_usable_memory() {
    let map = [MemoryRegion::reserved(0, 64 * MIB)];
    let mut storage = vec![0u32; 8];
    let mapper = BufferMapper::new(&mut storage);
    let result = unsafe { init_allocator(KERNEL_END, &map, &mapper) };
    assert_eq!(result.err(), Some(AllocError::NoMemory));
}
