//! # Legacy 8259A PIC Pair
//!
//! The master PIC serves IRQ 0–7, the slave IRQ 8–15 through the master's
//! cascade line 2. Both are remapped away from the exception vectors during
//! [`InterruptController::initialize`].
//!
//! ```text
//! ICW1  0x11 → command    edge triggered, cascade, ICW4 follows
//! ICW2  offset → data     vector base
//! ICW3  4 / 2 → data      master: slave on IRQ2, slave: cascade identity 2
//! ICW4  0x01 → data       8086 mode
//! ```

/// Master PIC command port.
pub const PIC1_COMMAND: u16 = 0x20;
/// Master PIC data (mask) port.
pub const PIC1_DATA: u16 = 0x21;
/// Slave PIC command port.
pub const PIC2_COMMAND: u16 = 0xA0;
/// Slave PIC data (mask) port.
pub const PIC2_DATA: u16 = 0xA1;

/// Unused POST diagnostic port, written to for a short I/O delay.
pub const IO_WAIT_PORT: u16 = 0x80;

const ICW1_INIT_ICW4: u8 = 0x11;
const ICW3_MASTER_SLAVE_ON_IRQ2: u8 = 0x04;
const ICW3_SLAVE_CASCADE_ID: u8 = 0x02;
const ICW4_8086: u8 = 0x01;
const CASCADE_IRQ: u8 = 2;
const ALL_MASKED: u8 = 0xFF;

/// Number of IRQ lines served by the PIC pair.
pub const PIC_IRQ_LINES: u8 = 16;

/// Byte-wide x86 port I/O.
pub trait PortIo {
    /// # Safety
    /// Writing to an arbitrary port can reconfigure hardware.
    unsafe fn outb(&mut self, port: u16, value: u8);

    /// # Safety
    /// Reading some ports has side effects.
    unsafe fn inb(&mut self, port: u16) -> u8;

    /// Give a slow device time to settle between writes.
    ///
    /// # Safety
    /// Writes to [`IO_WAIT_PORT`].
    unsafe fn io_wait(&mut self) {
        unsafe { self.outb(IO_WAIT_PORT, 0) };
    }
}

/// An interrupt controller for device IRQs.
pub trait InterruptController {
    /// Remap the controller so IRQ 0 raises `master_offset` and IRQ 8 raises `slave_offset`.
    fn initialize(&mut self, master_offset: u8, slave_offset: u8);

    /// Mask every IRQ line.
    fn disable(&mut self);

    /// Let `irq` through to the CPU.
    fn unmask_irq(&mut self, irq: u8);
}

/// The chained 8259A pair on the standard ports.
pub struct Pic8259<P> {
    ports: P,
}

impl<P: PortIo> Pic8259<P> {
    /// # Safety
    /// `ports` must reach a legacy PIC pair at the standard ports.
    pub const unsafe fn new(ports: P) -> Self {
        Self { ports }
    }

    pub const fn ports(&self) -> &P {
        &self.ports
    }

    fn write(&mut self, port: u16, value: u8) {
        // SAFETY: `new` guarantees the PIC ports are ours.
        unsafe {
            self.ports.outb(port, value);
            self.ports.io_wait();
        }
    }

    /// Current mask bytes `(master, slave)`.
    pub fn masks(&mut self) -> (u8, u8) {
        // SAFETY: Reading the mask registers has no side effects.
        unsafe { (self.ports.inb(PIC1_DATA), self.ports.inb(PIC2_DATA)) }
    }

    fn clear_mask_bit(&mut self, port: u16, line: u8) {
        // SAFETY: Reading the mask register has no side effects.
        let mask = unsafe { self.ports.inb(port) };
        self.write(port, mask & !(1 << line));
    }
}

impl<P: PortIo> InterruptController for Pic8259<P> {
    fn initialize(&mut self, master_offset: u8, slave_offset: u8) {
        self.write(PIC1_COMMAND, ICW1_INIT_ICW4);
        self.write(PIC2_COMMAND, ICW1_INIT_ICW4);
        self.write(PIC1_DATA, master_offset);
        self.write(PIC2_DATA, slave_offset);
        self.write(PIC1_DATA, ICW3_MASTER_SLAVE_ON_IRQ2);
        self.write(PIC2_DATA, ICW3_SLAVE_CASCADE_ID);
        self.write(PIC1_DATA, ICW4_8086);
        self.write(PIC2_DATA, ICW4_8086);
        log::debug!("8259 PIC remapped to {master_offset:#04x}/{slave_offset:#04x}");
    }

    fn disable(&mut self) {
        self.write(PIC1_DATA, ALL_MASKED);
        self.write(PIC2_DATA, ALL_MASKED);
    }

    fn unmask_irq(&mut self, irq: u8) {
        debug_assert!(irq < PIC_IRQ_LINES);
        if irq < 8 {
            self.clear_mask_bit(PIC1_DATA, irq);
        } else {
            self.clear_mask_bit(PIC2_DATA, irq - 8);
            self.clear_mask_bit(PIC1_DATA, CASCADE_IRQ);
        }
    }
}

#[cfg(target_arch = "x86")]
mod x86 {
    use super::PortIo;
    use core::arch::asm;

    /// Real port I/O through `in`/`out`.
    #[derive(Debug, Default, Copy, Clone)]
    pub struct X86Ports;

    impl PortIo for X86Ports {
        #[inline]
        unsafe fn outb(&mut self, port: u16, value: u8) {
            unsafe {
                asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags));
            }
        }

        #[inline]
        unsafe fn inb(&mut self, port: u16) -> u8 {
            let value: u8;
            unsafe {
                asm!("in al, dx", in("dx") port, out("al") value, options(nomem, nostack, preserves_flags));
            }
            value
        }
    }
}

#[cfg(target_arch = "x86")]
pub use x86::X86Ports;
