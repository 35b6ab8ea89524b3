//! # Physical Memory Access for the Block Allocator
//!
//! The allocator keeps its bitmap in physical memory, but Rust code can only
//! dereference addresses of the current address space. [`PhysMapper`] is the
//! seam that turns a physical range into a usable word slice.
//!
//! - Before paging, [`IdentityPhysMapper`] simply reinterprets the physical
//!   address as a pointer.
//! - In tests, a mapper hands out a host buffer instead.
//!
//! ## Example
//! ```rust
//! use kernel_alloc::phys_mapper::PhysMapper;
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! struct Buffer(*mut u32, usize);
//!
//! impl PhysMapper for Buffer {
//!     unsafe fn words_mut<'a>(&self, _pa: PhysicalAddress, words: usize) -> &'a mut [u32] {
//!         assert!(words <= self.1);
//!         unsafe { core::slice::from_raw_parts_mut(self.0, words) }
//!     }
//! }
//!
//! let mut storage = [0u32; 4];
//! let mapper = Buffer(storage.as_mut_ptr(), storage.len());
//! let words = unsafe { mapper.words_mut(PhysicalAddress::new(0x20_0000), 4) };
//! words[0] = 1;
//! ```

use kernel_memory_addresses::PhysicalAddress;

/// Turns physical memory into something Rust can write to.
pub trait PhysMapper {
    /// Map `words` 32-bit words starting at physical address `pa`.
    ///
    /// # Safety
    /// - `pa` must be 4-byte aligned and the whole range must be RAM that is
    ///   reachable through this mapper.
    /// - The caller must guarantee that nothing else aliases the range for
    ///   the lifetime `'a`.
    unsafe fn words_mut<'a>(&self, pa: PhysicalAddress, words: usize) -> &'a mut [u32];
}

/// [`PhysMapper`] for the pre-paging world, where physical equals virtual.
///
/// Also valid after boot paging is enabled, since low memory stays identity
/// mapped.
#[derive(Debug, Copy, Clone, Default)]
pub struct IdentityPhysMapper;

impl PhysMapper for IdentityPhysMapper {
    unsafe fn words_mut<'a>(&self, pa: PhysicalAddress, words: usize) -> &'a mut [u32] {
        let ptr: *mut u32 = pa.as_ptr();
        // SAFETY: Caller guarantees the range is identity mapped RAM and unaliased.
        unsafe { core::slice::from_raw_parts_mut(ptr, words) }
    }
}
