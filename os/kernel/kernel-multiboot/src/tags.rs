//! Tag framing.

use crate::{HEADER_SIZE, MultibootError, TAG_ALIGN, read_u32};

const TAG_HEADER_SIZE: usize = 8;

/// Known multiboot2 tag types.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TagType {
    End,
    CommandLine,
    BootLoaderName,
    MemoryMap,
    AcpiOldRsdp,
    AcpiNewRsdp,
    Other(u32),
}

impl TagType {
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::End,
            1 => Self::CommandLine,
            2 => Self::BootLoaderName,
            6 => Self::MemoryMap,
            14 => Self::AcpiOldRsdp,
            15 => Self::AcpiNewRsdp,
            other => Self::Other(other),
        }
    }
}

/// One tag, header stripped.
#[derive(Debug, Copy, Clone)]
pub struct Tag<'a> {
    raw_type: u32,
    payload: &'a [u8],
}

impl<'a> Tag<'a> {
    #[must_use]
    pub const fn tag_type(&self) -> TagType {
        TagType::from_raw(self.raw_type)
    }

    #[must_use]
    pub const fn raw_type(&self) -> u32 {
        self.raw_type
    }

    /// The bytes after the 8-byte tag header, `size - 8` long.
    #[must_use]
    pub const fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// The payload as a NUL-terminated UTF-8 string.
    #[must_use]
    pub fn payload_str(&self) -> Option<&'a str> {
        let end = self.payload.iter().position(|&b| b == 0)?;
        core::str::from_utf8(&self.payload[..end]).ok()
    }
}

/// Iterator over the tags of validated boot information.
#[derive(Debug, Clone)]
pub struct TagIter<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> TagIter<'a> {
    pub(crate) const fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: HEADER_SIZE,
        }
    }
}

impl<'a> Iterator for TagIter<'a> {
    type Item = Tag<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (raw_type, size) = header_at(self.bytes, self.offset)?;
        if raw_type == 0 {
            return None;
        }

        let payload = self
            .bytes
            .get(self.offset + TAG_HEADER_SIZE..self.offset + size)?;
        self.offset = next_offset(self.offset, size);
        Some(Tag { raw_type, payload })
    }
}

fn header_at(bytes: &[u8], offset: usize) -> Option<(u32, usize)> {
    if offset + TAG_HEADER_SIZE > bytes.len() {
        return None;
    }
    Some((read_u32(bytes, offset), read_u32(bytes, offset + 4) as usize))
}

const fn next_offset(offset: usize, size: usize) -> usize {
    (offset + size).next_multiple_of(TAG_ALIGN)
}

/// Walk the tag list once, checking every header against the buffer bounds.
pub(crate) fn validate(bytes: &[u8]) -> Result<(), MultibootError> {
    let mut offset = HEADER_SIZE;
    loop {
        let Some((raw_type, size)) = header_at(bytes, offset) else {
            return Err(MultibootError::MissingEndTag);
        };

        if size < TAG_HEADER_SIZE || offset + size > bytes.len() {
            return Err(MultibootError::BadTag {
                tag_type: raw_type,
                offset,
            });
        }

        if raw_type == 0 {
            return Ok(());
        }

        offset = next_offset(offset, size);
    }
}
