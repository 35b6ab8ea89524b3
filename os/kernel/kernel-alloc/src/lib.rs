//! # Physical Block Allocation
//!
//! The first allocator the kernel gets: a bitmap over 4 KiB physical blocks,
//! brought up before paging and before any heap exists.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Block Allocator                        │
//! │    • alloc / free single blocks                     │
//! │    • alloc_s / free_s contiguous runs (first fit)   │
//! │    • free + used == total after every operation     │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │              Block Bitmap                           │
//! │    • one bit per block, 1 = in use                  │
//! │    • stored right above the kernel image            │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │              Physical Mapper                        │
//! │    • physical range to word slice                   │
//! │    • identity before paging, host buffer in tests   │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use kernel_alloc::{BitmapLayout, BlockAllocator, MemoryRegion};
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! let map = [MemoryRegion::available(0x10_0000, 0x100_0000)];
//! let layout = BitmapLayout::plan(PhysicalAddress::new(0x20_0000), &map).unwrap();
//! let mut storage = vec![0u32; layout.bitmap_words()];
//! let mut blocks = BlockAllocator::new(layout, &mut storage, &map).unwrap();
//!
//! let block = blocks.alloc().unwrap();
//! assert_eq!(block, PhysicalAddress::new(0x20_1000));
//! unsafe { blocks.free(block) };
//! assert_eq!(blocks.used_blocks(), 0);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod bitmap;
pub mod block_alloc;
pub mod phys_mapper;

pub use block_alloc::{AllocError, BitmapLayout, BlockAllocator, ENOMEM, init_allocator};
pub use kernel_info::memory_map::{MemoryRegion, MemoryRegionKind};
pub use phys_mapper::{IdentityPhysMapper, PhysMapper};
