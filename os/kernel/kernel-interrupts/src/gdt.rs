//! # Global Descriptor Table (i386, flat)
//!
//! A multiboot2 loader leaves `CS` and `GDTR` undefined, so the kernel loads
//! its own table before any gate can reference a code selector.
//!
//! Index | Selector | Meaning
//! ------|----------|--------
//! 0     | 0x00     | Null
//! 1     | 0x08     | Kernel code, base 0, limit 4 GiB, 32-bit ([`KERNEL_CODE_SELECTOR`])
//! 2     | 0x10     | Kernel data/stack, base 0, limit 4 GiB ([`KERNEL_DATA_SELECTOR`])
//!
//! Paging does all the protecting; the segments only have to cover everything.

use bitfield_struct::bitfield;
use core::mem::size_of;

/// GDT index of the kernel code segment.
pub const KERNEL_CODE_INDEX: u16 = 1;

/// GDT index of the kernel data/stack segment.
pub const KERNEL_DATA_INDEX: u16 = 2;

/// Ring-0 selector of the kernel code segment.
pub const KERNEL_CODE_SELECTOR: u16 = SegmentSelector::kernel(KERNEL_CODE_INDEX).into_bits();

/// Ring-0 selector of the kernel data/stack segment.
pub const KERNEL_DATA_SELECTOR: u16 = SegmentSelector::kernel(KERNEL_DATA_INDEX).into_bits();

/// `lgdt` limit of [`Gdt`]: size in bytes minus one.
#[allow(clippy::cast_possible_truncation)]
pub const GDT_LIMIT: u16 = (size_of::<Gdt>() - 1) as u16;

const _: () = assert!(KERNEL_CODE_SELECTOR == 0x08);
const _: () = assert!(KERNEL_DATA_SELECTOR == 0x10);
const _: () = assert!(size_of::<SegmentDescriptor>() == 8);
const _: () = assert!(GDT_LIMIT == 23);

/// Type nibble: execute + read.
const TYPE_CODE_READ: u8 = 0b1010;

/// Type nibble: read + write.
const TYPE_DATA_WRITE: u8 = 0b0010;

/// Selector encoding: `index << 3 | TI | RPL`.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct SegmentSelector {
    #[bits(2)]
    pub rpl: u8,
    /// Set for LDT selectors.
    pub local: bool,
    #[bits(13)]
    pub index: u16,
}

impl SegmentSelector {
    /// GDT selector at `index` with RPL 0.
    #[must_use]
    pub const fn kernel(index: u16) -> Self {
        Self::new().with_index(index)
    }
}

/// A code or data segment descriptor.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub limit_lo: u16, // [15:0]
    pub base_lo: u16,  // [31:16]
    pub base_mid: u8,  // [39:32]
    #[bits(4)]
    pub typ: u8, // [43:40]
    pub s: bool,       // [44] code/data
    #[bits(2)]
    pub dpl: u8, // [46:45]
    pub p: bool,       // [47]
    #[bits(4)]
    pub limit_hi: u8, // [51:48]
    pub avl: bool,     // [52]
    pub l: bool,       // [53] 64-bit code, never set here
    pub db: bool,      // [54] 32-bit operands
    pub g: bool,       // [55] limit in 4 KiB units
    pub base_hi: u8,   // [63:56]
}

impl SegmentDescriptor {
    /// Base 0, limit 0xFFFFF pages, 32-bit, present.
    const fn flat(typ: u8, dpl: u8) -> Self {
        Self::new()
            .with_limit_lo(0xFFFF)
            .with_typ(typ)
            .with_s(true)
            .with_dpl(dpl & 0b11)
            .with_p(true)
            .with_limit_hi(0xF)
            .with_db(true)
            .with_g(true)
    }

    #[must_use]
    pub const fn flat_code(dpl: u8) -> Self {
        Self::flat(TYPE_CODE_READ, dpl)
    }

    #[must_use]
    pub const fn flat_data(dpl: u8) -> Self {
        Self::flat(TYPE_DATA_WRITE, dpl)
    }

    /// Segment base, reassembled.
    #[must_use]
    pub const fn base(&self) -> u32 {
        ((self.base_hi() as u32) << 24) | ((self.base_mid() as u32) << 16) | self.base_lo() as u32
    }

    /// Segment limit in granularity units.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        ((self.limit_hi() as u32) << 16) | self.limit_lo() as u32
    }
}

/// The kernel's GDT.
#[repr(C, align(8))]
pub struct Gdt {
    entries: [SegmentDescriptor; 3],
}

impl Default for Gdt {
    fn default() -> Self {
        Self::flat()
    }
}

impl Gdt {
    /// Null, ring-0 code, ring-0 data.
    #[must_use]
    pub const fn flat() -> Self {
        Self {
            entries: [
                SegmentDescriptor::new(),
                SegmentDescriptor::flat_code(0),
                SegmentDescriptor::flat_data(0),
            ],
        }
    }

    /// The descriptor a selector refers to, if it is inside the table.
    #[must_use]
    pub fn entry(&self, selector: u16) -> Option<SegmentDescriptor> {
        let index = SegmentSelector::from_bits(selector).index();
        self.entries.get(usize::from(index)).copied()
    }

    /// The `lgdt` operand describing this table at its current address.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn gdtr(&self) -> Gdtr {
        Gdtr {
            limit: GDT_LIMIT,
            base: core::ptr::from_ref(self) as usize as u32,
        }
    }
}

/// Operand format used by `lgdt`: 16-bit limit followed by 32-bit base.
#[repr(C, packed)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Gdtr {
    limit: u16,
    base: u32,
}

impl Gdtr {
    #[must_use]
    pub const fn base(&self) -> u32 {
        self.base
    }

    #[must_use]
    pub const fn limit(&self) -> u16 {
        self.limit
    }
}

/// Load `gdt`, reload `CS` with a far return, then point every data segment
/// register at the kernel data segment.
///
/// # Safety
/// Interrupts must be masked, and `gdt` must stay mapped for as long as the
/// CPU runs on it.
#[cfg(target_arch = "x86")]
pub unsafe fn load_gdt(gdt: &'static Gdt) {
    let gdtr = gdt.gdtr();
    unsafe {
        core::arch::asm!(
            "lgdt [{gdtr}]",
            "push {code}",
            "lea {tmp}, [2f]",
            "push {tmp}",
            "retf",
            "2:",
            "mov {tmp:x}, {data}",
            "mov ds, {tmp:x}",
            "mov es, {tmp:x}",
            "mov fs, {tmp:x}",
            "mov gs, {tmp:x}",
            "mov ss, {tmp:x}",
            gdtr = in(reg) core::ptr::from_ref(&gdtr),
            code = const KERNEL_CODE_SELECTOR,
            data = const KERNEL_DATA_SELECTOR,
            tmp = out(reg) _,
            options(preserves_flags),
        );
    }
}
