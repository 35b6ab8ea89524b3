//! # 32-bit Gate Descriptors
//!
//! One IDT slot on i386 is 8 bytes:
//!
//! ```text
//! byte  0..2   offset[15:0]
//! byte  2..4   code segment selector
//! byte  4      zero
//! byte  5      type/attributes  | P | DPL(2) | S | Type(4) |
//! byte  6..8   offset[31:16]
//! ```
//!
//! The byte layout is produced by [`GateDescriptor::to_bytes`] rather than by
//! relying on struct packing.

use bitfield_struct::bitfield;

/// Size of one gate descriptor in bytes.
pub const GATE_DESCRIPTOR_SIZE: usize = 8;

/// Gate type nibble of a 32-bit interrupt gate.
pub const GATE_TYPE_INTERRUPT32: u8 = 0xE;

/// Gate type nibble of a 32-bit trap gate.
pub const GATE_TYPE_TRAP32: u8 = 0xF;

/// Present, ring 0, 32-bit interrupt gate.
pub const INTERRUPT32_TYPE: u8 = GateAttributes::interrupt_gate().into_bits();

/// Code selector of every gate: the kernel code segment of [`crate::gdt::Gdt`].
pub const SYSTEM_CODE_SELECTOR: u16 = crate::gdt::KERNEL_CODE_SELECTOR;

const _: () = assert!(INTERRUPT32_TYPE == 0x8E);

/// The type/attribute byte of a gate descriptor.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct GateAttributes {
    /// **Type**: 0xE = 32-bit interrupt gate, 0xF = 32-bit trap gate.
    #[bits(4)]
    pub gate_type: u8,

    /// **S**: storage segment, zero for interrupt and trap gates.
    pub storage_segment: bool,

    /// **DPL**: lowest privilege level allowed to raise the gate with `int n`.
    #[bits(2)]
    pub dpl: u8,

    /// **P**: the slot holds a valid gate.
    pub present: bool,
}

impl GateAttributes {
    /// Present 32-bit interrupt gate at DPL 0.
    #[inline]
    #[must_use]
    pub const fn interrupt_gate() -> Self {
        Self::new()
            .with_gate_type(GATE_TYPE_INTERRUPT32)
            .with_storage_segment(false)
            .with_dpl(0)
            .with_present(true)
    }

    /// Present 32-bit trap gate at DPL 0.
    #[inline]
    #[must_use]
    pub const fn trap_gate() -> Self {
        Self::interrupt_gate().with_gate_type(GATE_TYPE_TRAP32)
    }
}

/// One decoded IDT slot.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct GateDescriptor {
    pub offset_low: u16,
    pub selector: u16,
    pub zero: u8,
    pub type_attr: u8,
    pub offset_high: u16,
}

impl GateDescriptor {
    /// An all-zero, non-present slot.
    pub const MISSING: Self = Self {
        offset_low: 0,
        selector: 0,
        zero: 0,
        type_attr: 0,
        offset_high: 0,
    };

    /// A gate jumping to `handler` through `selector`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(handler: u32, selector: u16, type_attr: u8) -> Self {
        Self {
            offset_low: (handler & 0xFFFF) as u16,
            selector,
            zero: 0,
            type_attr,
            offset_high: (handler >> 16) as u16,
        }
    }

    /// Full handler address, reassembled from the two offset halves.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> u32 {
        ((self.offset_high as u32) << 16) | self.offset_low as u32
    }

    #[inline]
    #[must_use]
    pub const fn attributes(&self) -> GateAttributes {
        GateAttributes::from_bits(self.type_attr)
    }

    #[inline]
    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.attributes().present()
    }

    /// The 8 bytes exactly as the CPU reads them.
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; GATE_DESCRIPTOR_SIZE] {
        let lo = self.offset_low.to_le_bytes();
        let sel = self.selector.to_le_bytes();
        let hi = self.offset_high.to_le_bytes();
        [lo[0], lo[1], sel[0], sel[1], self.zero, self.type_attr, hi[0], hi[1]]
    }

    #[must_use]
    pub const fn from_bytes(b: [u8; GATE_DESCRIPTOR_SIZE]) -> Self {
        Self {
            offset_low: u16::from_le_bytes([b[0], b[1]]),
            selector: u16::from_le_bytes([b[2], b[3]]),
            zero: b[4],
            type_attr: b[5],
            offset_high: u16::from_le_bytes([b[6], b[7]]),
        }
    }

    /// The descriptor as one little-endian quadword, as stored in the table.
    #[inline]
    #[must_use]
    pub const fn to_bits(&self) -> u64 {
        u64::from_le_bytes(self.to_bytes())
    }

    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self::from_bytes(bits.to_le_bytes())
    }
}
