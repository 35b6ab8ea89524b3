use kernel_sync::{InterruptMask, IrqGuard, without_interrupts};
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Op {
    Cli,
    Sti,
}

#[derive(Default)]
struct RecordingCpu {
    enabled: Cell<bool>,
    ops: RefCell<Vec<Op>>,
}

impl RecordingCpu {
    fn with_interrupts(enabled: bool) -> Self {
        let cpu = Self::default();
        cpu.enabled.set(enabled);
        cpu
    }
}

impl InterruptMask for RecordingCpu {
    fn interrupts_enabled(&self) -> bool {
        self.enabled.get()
    }

    fn disable_interrupts(&self) {
        self.ops.borrow_mut().push(Op::Cli);
        self.enabled.set(false);
    }

    fn enable_interrupts(&self) {
        self.ops.borrow_mut().push(Op::Sti);
        self.enabled.set(true);
    }
}

#[test]
fn guard_masks_and_restores_enabled_interrupts() {
    let cpu = RecordingCpu::with_interrupts(true);
    {
        let g = IrqGuard::new(&cpu);
        assert!(g.restores_interrupts());
        assert!(!cpu.interrupts_enabled());
    }
    assert!(cpu.interrupts_enabled());
    assert_eq!(*cpu.ops.borrow(), vec![Op::Cli, Op::Sti]);
}

#[test]
fn guard_leaves_disabled_interrupts_alone() {
    let cpu = RecordingCpu::with_interrupts(false);
    {
        let g = IrqGuard::new(&cpu);
        assert!(!g.restores_interrupts());
    }
    assert!(!cpu.interrupts_enabled());
    assert!(cpu.ops.borrow().is_empty());
}

#[test]
fn nested_guards_restore_only_at_the_outermost_level() {
    let cpu = RecordingCpu::with_interrupts(true);
    {
        let _outer = IrqGuard::new(&cpu);
        {
            let _inner = IrqGuard::new(&cpu);
        }
        assert!(!cpu.interrupts_enabled());
    }
    assert!(cpu.interrupts_enabled());
    assert_eq!(*cpu.ops.borrow(), vec![Op::Cli, Op::Sti]);
}

#[test]
fn without_interrupts_returns_the_closure_value() {
    let cpu = RecordingCpu::with_interrupts(true);
    let seen = without_interrupts(&cpu, || cpu.interrupts_enabled());
    assert!(!seen);
    assert!(cpu.interrupts_enabled());
}

#[test]
fn guard_restores_on_unwind() {
    let cpu = RecordingCpu::with_interrupts(true);
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let _g = IrqGuard::new(&cpu);
        panic!("handler table update failed");
    }));
    assert!(result.is_err());
    assert!(cpu.interrupts_enabled());
}
