//! # RSDP/XSDP (Root/Extended System Description Pointer)

use crate::sum;

/// Signature at offset 0 of every RSDP.
pub const RSDP_SIGNATURE: &[u8; 8] = b"RSD PTR ";

/// Size of the ACPI 1.0 structure, also the span of the first checksum.
pub const RSDP_V1_LEN: usize = 20;

/// Size of the ACPI 2.0 structure.
pub const RSDP_V2_LEN: usize = 36;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum RsdpError {
    #[error("RSDP truncated: {len} bytes, {needed} required")]
    Truncated { len: usize, needed: usize },
    #[error("RSDP signature mismatch")]
    BadSignature,
    #[error("RSDP checksum mismatch")]
    BadChecksum,
    #[error("XSDP extended checksum mismatch")]
    BadExtendedChecksum,
}

/// A validated copy of the RSDP, ACPI 1.0 or 2.0+.
///
/// Field offsets, all little endian:
///
/// | Offset | Size | Field            | Version |
/// |--------|------|------------------|---------|
/// | 0      | 8    | signature        | 1.0     |
/// | 8      | 1    | checksum         | 1.0     |
/// | 9      | 6    | OEM ID           | 1.0     |
/// | 15     | 1    | revision         | 1.0     |
/// | 16     | 4    | RSDT address     | 1.0     |
/// | 20     | 4    | length           | 2.0     |
/// | 24     | 8    | XSDT address     | 2.0     |
/// | 32     | 1    | extended checksum| 2.0     |
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Rsdp {
    oem_id: [u8; 6],
    revision: u8,
    rsdt_address: u32,
    xsdt_address: Option<u64>,
}

impl Rsdp {
    /// Validate and decode an RSDP from its raw bytes.
    ///
    /// # Errors
    /// Any [`RsdpError`] if the bytes are short, carry the wrong signature, or
    /// fail either checksum.
    pub fn parse(bytes: &[u8]) -> Result<Self, RsdpError> {
        let v1 = bytes.get(..RSDP_V1_LEN).ok_or(RsdpError::Truncated {
            len: bytes.len(),
            needed: RSDP_V1_LEN,
        })?;

        if &v1[0..8] != RSDP_SIGNATURE {
            return Err(RsdpError::BadSignature);
        }
        if sum(v1) != 0 {
            return Err(RsdpError::BadChecksum);
        }

        let mut oem_id = [0; 6];
        oem_id.copy_from_slice(&v1[9..15]);
        let revision = v1[15];
        let rsdt_address = read_u32(v1, 16);

        if revision < 2 {
            return Ok(Self {
                oem_id,
                revision,
                rsdt_address,
                xsdt_address: None,
            });
        }

        let v2 = bytes.get(..RSDP_V2_LEN).ok_or(RsdpError::Truncated {
            len: bytes.len(),
            needed: RSDP_V2_LEN,
        })?;

        // The length field covers the whole table; never trust it below the v2 size.
        let length = (read_u32(v2, 20) as usize).max(RSDP_V2_LEN);
        let full = bytes.get(..length).ok_or(RsdpError::Truncated {
            len: bytes.len(),
            needed: length,
        })?;
        if sum(full) != 0 {
            return Err(RsdpError::BadExtendedChecksum);
        }

        Ok(Self {
            oem_id,
            revision,
            rsdt_address,
            xsdt_address: Some(read_u64(v2, 24)),
        })
    }

    /// Physical address of the RSDT.
    #[must_use]
    pub const fn rsdt_address(&self) -> u32 {
        self.rsdt_address
    }

    /// Physical address of the XSDT, ACPI 2.0+ only.
    #[must_use]
    pub const fn xsdt_address(&self) -> Option<u64> {
        self.xsdt_address
    }

    #[must_use]
    pub const fn revision(&self) -> u8 {
        self.revision
    }

    /// OEM ID, trimmed of trailing spaces if it is ASCII.
    #[must_use]
    pub fn oem_id(&self) -> &str {
        core::str::from_utf8(&self.oem_id)
            .map(str::trim_end)
            .unwrap_or("")
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum_fixup;

    fn v1(rsdt: u32) -> [u8; RSDP_V1_LEN] {
        let mut raw = [0u8; RSDP_V1_LEN];
        raw[..8].copy_from_slice(RSDP_SIGNATURE);
        raw[9..15].copy_from_slice(b"BOCHS ");
        raw[16..20].copy_from_slice(&rsdt.to_le_bytes());
        raw[8] = checksum_fixup(&raw);
        raw
    }

    fn v2(rsdt: u32, xsdt: u64) -> [u8; RSDP_V2_LEN] {
        let mut raw = [0u8; RSDP_V2_LEN];
        raw[..8].copy_from_slice(RSDP_SIGNATURE);
        raw[9..15].copy_from_slice(b"QEMU  ");
        raw[15] = 2;
        raw[16..20].copy_from_slice(&rsdt.to_le_bytes());
        raw[20..24].copy_from_slice(&(RSDP_V2_LEN as u32).to_le_bytes());
        raw[24..32].copy_from_slice(&xsdt.to_le_bytes());
        raw[8] = checksum_fixup(&raw[..RSDP_V1_LEN]);
        raw[32] = checksum_fixup(&raw);
        raw
    }

    #[test]
    fn parses_acpi_1() {
        let rsdp = Rsdp::parse(&v1(0x07FE_14A0)).unwrap();
        assert_eq!(rsdp.revision(), 0);
        assert_eq!(rsdp.rsdt_address(), 0x07FE_14A0);
        assert_eq!(rsdp.xsdt_address(), None);
        assert_eq!(rsdp.oem_id(), "BOCHS");
    }

    #[test]
    fn parses_acpi_2() {
        let rsdp = Rsdp::parse(&v2(0x07FE_14A0, 0x07FE_1500)).unwrap();
        assert_eq!(rsdp.revision(), 2);
        assert_eq!(rsdp.rsdt_address(), 0x07FE_14A0);
        assert_eq!(rsdp.xsdt_address(), Some(0x07FE_1500));
        assert_eq!(rsdp.oem_id(), "QEMU");
    }

    #[test]
    fn rejects_bad_signature() {
        let mut raw = v1(0x1000);
        raw[0] = b'X';
        assert_eq!(Rsdp::parse(&raw), Err(RsdpError::BadSignature));
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut raw = v1(0x1000);
        raw[16] ^= 0xFF;
        assert_eq!(Rsdp::parse(&raw), Err(RsdpError::BadChecksum));
    }

    #[test]
    fn rejects_bad_extended_checksum() {
        let mut raw = v2(0x1000, 0x2000);
        raw[24] ^= 0x01;
        assert_eq!(Rsdp::parse(&raw), Err(RsdpError::BadExtendedChecksum));
    }

    #[test]
    fn rejects_truncated_structures() {
        let raw = v2(0x1000, 0x2000);
        assert_eq!(
            Rsdp::parse(&raw[..12]),
            Err(RsdpError::Truncated { len: 12, needed: RSDP_V1_LEN })
        );
        assert_eq!(
            Rsdp::parse(&raw[..RSDP_V1_LEN]),
            Err(RsdpError::Truncated { len: RSDP_V1_LEN, needed: RSDP_V2_LEN })
        );
    }
}
