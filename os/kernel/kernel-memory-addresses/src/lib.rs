//! # Physical and Virtual Memory Address Types (i386)
//!
//! Strongly typed wrappers for 32-bit memory addresses used by the early boot
//! path.
//!
//! ## Overview
//!
//! Before paging is enabled every pointer the kernel touches is a physical
//! address; afterwards the same memory is reached through a fixed higher-half
//! alias. Mixing the two up is a silent fault with no diagnostic path, so the
//! two spaces get distinct types:
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`MemoryAddress`] | A raw 32-bit address, either physical or virtual. |
//! | [`PhysicalAddress`] | Physical RAM or MMIO, as reported by the boot loader. |
//! | [`VirtualAddress`] | An address that is only valid once paging is live. |
//!
//! ## Blocks
//!
//! Physical memory is handed out in fixed 4 KiB blocks ([`BLOCK_SIZE`]). The
//! alignment helpers on [`MemoryAddress`] are `const fn` and work for any power
//! of two alignment.
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let end_of_kernel = PhysicalAddress::new(0x0020_0123);
//! assert_eq!(end_of_kernel.align_up(BLOCK_SIZE), Some(PhysicalAddress::new(0x0020_1000)));
//! assert_eq!(end_of_kernel.block_index(), 0x200);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

mod physical_address;
mod virtual_address;

pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;

use core::fmt;
use core::ops::{Add, AddAssign};

/// Size of one physical memory block (a 4 KiB page frame).
pub const BLOCK_SIZE: u32 = 4096;

/// `log2(BLOCK_SIZE)`.
pub const BLOCK_SHIFT: u32 = 12;

const _: () = assert!(1 << BLOCK_SHIFT == BLOCK_SIZE);

/// A raw 32-bit memory address.
///
/// This is the untyped core that [`PhysicalAddress`] and [`VirtualAddress`]
/// wrap. Arithmetic wraps on overflow only where explicitly requested; the
/// alignment helpers report overflow through `Option`.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MemoryAddress(u32);

impl MemoryAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize as u32)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Whether the address is a multiple of `align` (a power of two).
    #[inline]
    #[must_use]
    pub const fn is_aligned(self, align: u32) -> bool {
        debug_assert!(align.is_power_of_two());
        self.0 & (align - 1) == 0
    }

    /// Round down to a multiple of `align` (a power of two).
    #[inline]
    #[must_use]
    pub const fn align_down(self, align: u32) -> Self {
        debug_assert!(align.is_power_of_two());
        Self(self.0 & !(align - 1))
    }

    /// Round up to a multiple of `align` (a power of two).
    ///
    /// Returns `None` if the result does not fit into 32 bits.
    #[inline]
    #[must_use]
    pub const fn align_up(self, align: u32) -> Option<Self> {
        debug_assert!(align.is_power_of_two());
        match self.0.checked_add(align - 1) {
            Some(v) => Some(Self(v & !(align - 1))),
            None => None,
        }
    }

    /// Index of the [`BLOCK_SIZE`] block containing this address.
    #[inline]
    #[must_use]
    pub const fn block_index(self) -> u32 {
        self.0 >> BLOCK_SHIFT
    }

    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: u32) -> Option<Self> {
        match self.0.checked_add(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Debug for MemoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl fmt::Display for MemoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u32> for MemoryAddress {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}

impl Add<u32> for MemoryAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u32> for MemoryAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u32) {
        self.0 += rhs;
    }
}

/// Number of [`BLOCK_SIZE`] blocks needed to hold `bytes` bytes.
#[inline]
#[must_use]
pub const fn blocks_for_bytes(bytes: u32) -> u32 {
    bytes.div_ceil(BLOCK_SIZE)
}
