//! # Interrupt Descriptor Table (i386)
//!
//! 256 gate descriptors plus the 6-byte IDTR operand that `lidt` consumes.
//!
//! Each slot is kept as one `u64` so that replacing a descriptor is a single
//! store of the whole quadword. Callers still mask interrupts around updates
//! of a loaded table (see [`crate::cpu::Cpu::install_handler`]).

use crate::descriptor::{GATE_DESCRIPTOR_SIZE, GateDescriptor};
use core::mem::{align_of, size_of};

/// Number of IDT slots.
pub const MAX_INTERRUPTS: usize = 256;

/// IDTR limit for a full table: size in bytes minus one.
#[allow(clippy::cast_possible_truncation)]
pub const IDT_LIMIT: u16 = (MAX_INTERRUPTS * GATE_DESCRIPTOR_SIZE - 1) as u16;

const _: () = assert!(IDT_LIMIT == 2047);
const _: () = assert!(size_of::<Idt>() == MAX_INTERRUPTS * GATE_DESCRIPTOR_SIZE);
const _: () = assert!(align_of::<Idt>() == 8);
const _: () = assert!(size_of::<Idtr>() == 6);

/// A 256-entry interrupt descriptor table.
#[repr(C, align(8))]
pub struct Idt {
    entries: [u64; MAX_INTERRUPTS],
}

impl Default for Idt {
    fn default() -> Self {
        Self::new()
    }
}

impl Idt {
    /// A table of non-present slots.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [0; MAX_INTERRUPTS],
        }
    }

    /// Zero every slot.
    pub fn clear(&mut self) {
        self.entries.fill(0);
    }

    /// Decode slot `vector`.
    #[inline]
    #[must_use]
    pub fn get(&self, vector: u8) -> GateDescriptor {
        GateDescriptor::from_bits(self.entries[usize::from(vector)])
    }

    /// Replace slot `vector` with `descriptor` in one quadword store.
    #[inline]
    pub fn set(&mut self, vector: u8, descriptor: GateDescriptor) {
        self.entries[usize::from(vector)] = descriptor.to_bits();
    }

    /// Iterate all slots in vector order.
    pub fn iter(&self) -> impl Iterator<Item = GateDescriptor> + '_ {
        self.entries.iter().map(|&bits| GateDescriptor::from_bits(bits))
    }

    /// The IDTR operand describing this table at its current address.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn idtr(&self) -> Idtr {
        Idtr::new(core::ptr::from_ref(self) as usize as u32, IDT_LIMIT)
    }
}

/// Operand format used by `lidt`: 16-bit limit followed by 32-bit base.
#[repr(C, packed)]
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Idtr {
    limit: u16,
    base: u32,
}

impl Idtr {
    #[must_use]
    pub const fn new(base: u32, limit: u16) -> Self {
        Self { limit, base }
    }

    #[must_use]
    pub const fn base(&self) -> u32 {
        self.base
    }

    #[must_use]
    pub const fn limit(&self) -> u16 {
        self.limit
    }

    /// The 6 bytes exactly as `lidt` reads them.
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; 6] {
        let l = self.limit.to_le_bytes();
        let b = self.base.to_le_bytes();
        [l[0], l[1], b[0], b[1], b[2], b[3]]
    }
}

impl core::fmt::Debug for Idtr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let (base, limit) = (self.base, self.limit);
        f.debug_struct("Idtr")
            .field("base", &format_args!("{base:#010x}"))
            .field("limit", &limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{INTERRUPT32_TYPE, SYSTEM_CODE_SELECTOR};

    #[test]
    fn idtr_encoding() {
        let idtr = Idtr::new(0xC010_8000, IDT_LIMIT);
        assert_eq!(idtr.to_bytes(), [0xFF, 0x07, 0x00, 0x80, 0x10, 0xC0]);
    }

    #[test]
    fn idtr_points_at_the_table() {
        let idt = Idt::new();
        let idtr = idt.idtr();
        assert_eq!(idtr.base() as usize, core::ptr::from_ref(&idt) as usize & 0xFFFF_FFFF);
        assert_eq!(idtr.limit(), 2047);
    }

    #[test]
    fn set_then_get() {
        let mut idt = Idt::new();
        let gate = GateDescriptor::new(0x0010_1234, SYSTEM_CODE_SELECTOR, INTERRUPT32_TYPE);
        idt.set(0x21, gate);
        assert_eq!(idt.get(0x21), gate);
        assert_eq!(idt.iter().filter(GateDescriptor::is_present).count(), 1);

        idt.clear();
        assert!(idt.iter().all(|g| g == GateDescriptor::MISSING));
    }
}
