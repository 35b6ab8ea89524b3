//! # ACPI Root Pointer Support
//!
//! The early-boot kernel only needs one thing from ACPI: the address of the
//! Root System Description Table (RSDT), so that later stages can walk the
//! firmware tables. The boot loader hands over a copy of the Root System
//! Description Pointer (RSDP) inside the multiboot2 information; this crate
//! validates that copy before anyone trusts the address inside it.
//!
//! ```text
//! Boot loader (multiboot2 ACPI tag)
//!     ↓
//! RSDP/XSDP copy   ← validated here
//!     ↓
//! RSDT/XSDT        ← address handed to the kernel parameter block
//!     ↓
//! Individual ACPI tables (FADT, MADT, ...)
//! ```
//!
//! ## Versions
//!
//! * **ACPI 1.0** (`revision == 0`): 20-byte RSDP, 32-bit RSDT address, one
//!   checksum over all 20 bytes.
//! * **ACPI 2.0+** (`revision >= 2`): 36-byte XSDP with a length field, a
//!   64-bit XSDT address and an extended checksum over the whole structure.
//!
//! ## Example
//!
//! ```rust
//! use kernel_acpi::rsdp::Rsdp;
//!
//! let mut raw = [0u8; 20];
//! raw[..8].copy_from_slice(b"RSD PTR ");
//! raw[9..15].copy_from_slice(b"BOCHS ");
//! raw[16..20].copy_from_slice(&0x07FE_14A0u32.to_le_bytes());
//! raw[8] = kernel_acpi::checksum_fixup(&raw);
//!
//! let rsdp = Rsdp::parse(&raw).unwrap();
//! assert_eq!(rsdp.rsdt_address(), 0x07FE_14A0);
//! assert_eq!(rsdp.xsdt_address(), None);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod rsdp;

pub use rsdp::{Rsdp, RsdpError};

/// Wrapping byte sum; a valid ACPI structure sums to zero.
#[must_use]
pub fn sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |a, &b| a.wrapping_add(b))
}

/// The byte that, added to `bytes`, makes their sum zero.
///
/// Pass the structure with its checksum byte still zero.
#[must_use]
pub fn checksum_fixup(bytes: &[u8]) -> u8 {
    0u8.wrapping_sub(sum(bytes))
}
