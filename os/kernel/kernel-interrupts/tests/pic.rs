use kernel_interrupts::pic::{IO_WAIT_PORT, PIC1_DATA, PIC2_DATA};
use kernel_interrupts::{InterruptController, Pic8259, PortIo};
use std::collections::HashMap;

/// Remembers the last byte written to every port and logs all writes.
#[derive(Default)]
struct FakePorts {
    latched: HashMap<u16, u8>,
    writes: Vec<(u16, u8)>,
}

impl FakePorts {
    fn writes_without_delays(&self) -> Vec<(u16, u8)> {
        self.writes
            .iter()
            .copied()
            .filter(|&(port, _)| port != IO_WAIT_PORT)
            .collect()
    }
}

impl PortIo for FakePorts {
    unsafe fn outb(&mut self, port: u16, value: u8) {
        self.latched.insert(port, value);
        self.writes.push((port, value));
    }

    unsafe fn inb(&mut self, port: u16) -> u8 {
        self.latched.get(&port).copied().unwrap_or(0)
    }
}

fn parked_pic() -> Pic8259<FakePorts> {
    let mut pic = unsafe { Pic8259::new(FakePorts::default()) };
    pic.initialize(0x20, 0x28);
    pic.disable();
    pic
}

#[test]
fn initialization_sends_the_icw_sequence() {
    let mut pic = unsafe { Pic8259::new(FakePorts::default()) };
    pic.initialize(0x20, 0x28);
    assert_eq!(
        pic.ports().writes_without_delays(),
        vec![
            (0x20, 0x11),
            (0xA0, 0x11),
            (0x21, 0x20),
            (0xA1, 0x28),
            (0x21, 0x04),
            (0xA1, 0x02),
            (0x21, 0x01),
            (0xA1, 0x01),
        ]
    );
    // Every write is followed by an I/O delay.
    assert_eq!(pic.ports().writes.len(), 16);
}

#[test]
fn disable_masks_every_line() {
    let mut pic = parked_pic();
    assert_eq!(pic.masks(), (0xFF, 0xFF));
}

#[test]
fn unmasking_a_master_line() {
    let mut pic = parked_pic();
    pic.unmask_irq(1);
    assert_eq!(pic.masks(), (0xFD, 0xFF));
    pic.unmask_irq(0);
    assert_eq!(pic.masks(), (0xFC, 0xFF));
}

#[test]
fn unmasking_a_slave_line_opens_the_cascade() {
    let mut pic = parked_pic();
    pic.unmask_irq(12);
    assert_eq!(pic.masks(), (0xFB, 0xEF));
    assert_eq!(pic.ports().latched[&PIC2_DATA], 0xEF);
    assert_eq!(pic.ports().latched[&PIC1_DATA], 0xFB);
}
