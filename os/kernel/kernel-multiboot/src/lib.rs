//! # Multiboot2 Boot Information
//!
//! A zero-copy reader for the boot information structure a multiboot2 loader
//! (GRUB, QEMU's `-kernel` with a multiboot2 image, ...) leaves in memory. The
//! kernel receives its address in `EBX` and the loader magic in `EAX`.
//!
//! ## Format
//!
//! ```text
//! ┌──────────────┬──────────────┐
//! │ total_size   │ reserved     │  8 bytes, u32 little endian each
//! ├──────────────┴──────────────┤
//! │ tag: type u32, size u32     │  every tag starts 8-byte aligned
//! │      payload (size - 8)     │
//! ├─────────────────────────────┤
//! │ ...                         │
//! ├─────────────────────────────┤
//! │ end tag: type 0, size 8     │
//! └─────────────────────────────┘
//! ```
//!
//! The whole structure is validated once in [`BootInformation::parse`]; the
//! accessors afterwards cannot fail on malformed framing.
//!
//! Only the tags the early kernel needs are decoded:
//!
//! | Type | Tag                    | Accessor                                    |
//! |------|------------------------|---------------------------------------------|
//! | 1    | boot command line      | [`BootInformation::command_line`]           |
//! | 2    | boot loader name       | [`BootInformation::boot_loader_name`]       |
//! | 6    | memory map             | [`BootInformation::memory_regions`]         |
//! | 14   | ACPI 1.0 RSDP copy     | [`BootInformation::rsdp`]                   |
//! | 15   | ACPI 2.0 RSDP copy     | [`BootInformation::rsdp`]                   |

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod memory_map;
mod tags;

pub use memory_map::MemoryRegions;
pub use tags::{Tag, TagIter, TagType};

use kernel_acpi::Rsdp;
use kernel_info::boot::MULTIBOOT2_BOOTLOADER_MAGIC;
use kernel_memory_addresses::PhysicalAddress;
use log::warn;

/// Size of the fixed header in front of the first tag.
pub const HEADER_SIZE: usize = 8;

/// Required alignment of the structure and of every tag.
pub const TAG_ALIGN: usize = 8;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MultibootError {
    #[error("unexpected boot loader magic {found:#010x}")]
    BadMagic { found: u32 },
    #[error("boot information is not 8-byte aligned")]
    Misaligned,
    #[error("boot information truncated: {available} bytes available, {needed} required")]
    Truncated { available: usize, needed: usize },
    #[error("malformed tag of type {tag_type} at offset {offset}")]
    BadTag { tag_type: u32, offset: usize },
    #[error("boot information has no end tag")]
    MissingEndTag,
}

/// Validated view of the multiboot2 boot information.
#[derive(Debug, Copy, Clone)]
pub struct BootInformation<'a> {
    bytes: &'a [u8],
}

impl<'a> BootInformation<'a> {
    /// Validate `bytes` as multiboot2 boot information.
    ///
    /// `bytes` may be longer than the structure; everything past `total_size`
    /// is ignored.
    ///
    /// # Errors
    /// [`MultibootError`] if the magic does not match, the buffer is not
    /// 8-byte aligned, or the tag framing is broken.
    pub fn parse(bytes: &'a [u8], magic: u32) -> Result<Self, MultibootError> {
        if magic != MULTIBOOT2_BOOTLOADER_MAGIC {
            return Err(MultibootError::BadMagic { found: magic });
        }
        if !(bytes.as_ptr() as usize).is_multiple_of(TAG_ALIGN) {
            return Err(MultibootError::Misaligned);
        }
        if bytes.len() < HEADER_SIZE {
            return Err(MultibootError::Truncated {
                available: bytes.len(),
                needed: HEADER_SIZE,
            });
        }

        let total_size = read_u32(bytes, 0) as usize;
        if total_size < HEADER_SIZE || total_size > bytes.len() {
            return Err(MultibootError::Truncated {
                available: bytes.len(),
                needed: total_size.max(HEADER_SIZE),
            });
        }

        let bytes = &bytes[..total_size];
        tags::validate(bytes)?;
        Ok(Self { bytes })
    }

    /// Validate the boot information the loader left at `ptr`.
    ///
    /// # Errors
    /// See [`BootInformation::parse`].
    ///
    /// # Safety
    /// If `magic` matches and `ptr` is 8-byte aligned, `ptr` must point to
    /// readable memory of at least `total_size` bytes that stays unmodified
    /// for `'a`.
    pub unsafe fn from_ptr(ptr: *const u8, magic: u32) -> Result<Self, MultibootError> {
        if magic != MULTIBOOT2_BOOTLOADER_MAGIC {
            return Err(MultibootError::BadMagic { found: magic });
        }
        if ptr.is_null() || !(ptr as usize).is_multiple_of(TAG_ALIGN) {
            return Err(MultibootError::Misaligned);
        }

        // SAFETY: Aligned, non-null, and the caller vouches for the first 8 bytes.
        let total_size = unsafe { ptr.cast::<u32>().read() } as usize;
        // SAFETY: The caller guarantees `total_size` readable bytes.
        let bytes = unsafe { core::slice::from_raw_parts(ptr, total_size.max(HEADER_SIZE)) };
        Self::parse(bytes, magic)
    }

    /// Size of the structure in bytes, as reported by the loader.
    #[must_use]
    pub const fn total_size(&self) -> usize {
        self.bytes.len()
    }

    /// Iterate all tags up to, not including, the end tag.
    #[must_use]
    pub fn tags(&self) -> TagIter<'a> {
        TagIter::new(self.bytes)
    }

    fn tag(&self, ty: TagType) -> Option<Tag<'a>> {
        self.tags().find(|t| t.tag_type() == ty)
    }

    /// The physical memory map (tag type 6).
    #[must_use]
    pub fn memory_regions(&self) -> Option<MemoryRegions<'a>> {
        self.tag(TagType::MemoryMap)
            .and_then(|t| MemoryRegions::new(t.payload()))
    }

    /// The kernel command line, without its NUL terminator.
    #[must_use]
    pub fn command_line(&self) -> Option<&'a str> {
        self.tag(TagType::CommandLine).and_then(|t| t.payload_str())
    }

    /// The name of the boot loader, without its NUL terminator.
    #[must_use]
    pub fn boot_loader_name(&self) -> Option<&'a str> {
        self.tag(TagType::BootLoaderName).and_then(|t| t.payload_str())
    }

    /// The validated RSDP copy, preferring the ACPI 2.0 tag.
    ///
    /// A tag whose RSDP fails validation is logged and skipped.
    #[must_use]
    pub fn rsdp(&self) -> Option<Rsdp> {
        [TagType::AcpiNewRsdp, TagType::AcpiOldRsdp]
            .into_iter()
            .filter_map(|ty| self.tag(ty))
            .find_map(|tag| match Rsdp::parse(tag.payload()) {
                Ok(rsdp) => Some(rsdp),
                Err(e) => {
                    warn!("Ignoring RSDP in multiboot tag {}: {e}", tag.raw_type());
                    None
                }
            })
    }

    /// Physical address of the ACPI RSDT, if the loader passed a valid RSDP
    /// pointing to a non-null table.
    #[must_use]
    pub fn rsdt_address(&self) -> Option<PhysicalAddress> {
        self.rsdp()
            .map(|rsdp| PhysicalAddress::new(rsdp.rsdt_address()))
            .filter(|pa| !pa.is_null())
    }
}

pub(crate) fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

pub(crate) fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}
