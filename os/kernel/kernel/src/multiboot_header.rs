//! The multiboot2 header the boot loader scans the image for.

use core::mem::size_of;

pub const MULTIBOOT2_HEADER_MAGIC: u32 = 0xE852_50D6;

/// Protected-mode i386.
pub const ARCHITECTURE_I386: u32 = 0;

/// Header with no optional tags, just the end tag.
#[repr(C, align(8))]
#[derive(Debug, Copy, Clone)]
pub struct Multiboot2Header {
    magic: u32,
    architecture: u32,
    header_length: u32,
    checksum: u32,
    end_tag_type: u16,
    end_tag_flags: u16,
    end_tag_size: u32,
}

#[allow(clippy::cast_possible_truncation)]
const HEADER_LENGTH: u32 = size_of::<Multiboot2Header>() as u32;

const _: () = assert!(HEADER_LENGTH == 24);

impl Multiboot2Header {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            magic: MULTIBOOT2_HEADER_MAGIC,
            architecture: ARCHITECTURE_I386,
            header_length: HEADER_LENGTH,
            checksum: 0u32.wrapping_sub(
                MULTIBOOT2_HEADER_MAGIC
                    .wrapping_add(ARCHITECTURE_I386)
                    .wrapping_add(HEADER_LENGTH),
            ),
            end_tag_type: 0,
            end_tag_flags: 0,
            end_tag_size: 8,
        }
    }

    /// Sum of the four header fields; zero for a valid header.
    #[must_use]
    pub const fn field_sum(&self) -> u32 {
        self.magic
            .wrapping_add(self.architecture)
            .wrapping_add(self.header_length)
            .wrapping_add(self.checksum)
    }
}

#[cfg(target_os = "none")]
#[used]
#[unsafe(link_section = ".multiboot2")]
static MULTIBOOT2_HEADER: Multiboot2Header = Multiboot2Header::new();
