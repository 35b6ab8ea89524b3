//! # Exception Entry Stubs
//!
//! Every stub normalizes the stack to an [`ExceptionFrame`] (pushing a zero
//! error code where the CPU does not) and jumps to a shared tail that reports
//! the exception and halts. Early boot has no way to recover from a fault.
//!
//! Every other vector, reserved exceptions and device IRQs alike, lands in
//! [`default_interrupt`], which is just as fatal.
//!
//! ```text
//! esp+16  eflags
//! esp+12  cs
//! esp+8   eip
//! esp+4   error code (or 0)
//! esp     vector
//! ```

use crate::early_panic::{UnhandledInterrupt, early_panic};
use core::arch::naked_asm;
use kernel_interrupts::{Exception, ExceptionHandlers};

/// What the stubs leave on the stack.
#[repr(C)]
#[derive(Debug)]
pub struct ExceptionFrame {
    pub vector: u32,
    pub error_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
}

macro_rules! exception_stub {
    ($name:ident, $exception:ident) => {
        const _: () = assert!(!Exception::$exception.has_error_code());

        #[unsafe(naked)]
        extern "C" fn $name() {
            naked_asm!(
                "push 0",
                "push {vector}",
                "jmp {tail}",
                vector = const Exception::$exception as u8,
                tail = sym exception_tail,
            );
        }
    };
    ($name:ident, $exception:ident, error_code) => {
        const _: () = assert!(Exception::$exception.has_error_code());

        #[unsafe(naked)]
        extern "C" fn $name() {
            naked_asm!(
                "push {vector}",
                "jmp {tail}",
                vector = const Exception::$exception as u8,
                tail = sym exception_tail,
            );
        }
    };
}

exception_stub!(divide_by_zero, DivideByZero);
exception_stub!(debug, Debug);
exception_stub!(non_maskable_interrupt, NonMaskableInterrupt);
exception_stub!(breakpoint, Breakpoint);
exception_stub!(overflow, Overflow);
exception_stub!(bound_range_exceeded, BoundRangeExceeded);
exception_stub!(invalid_opcode, InvalidOpcode);
exception_stub!(device_not_available, DeviceNotAvailable);
exception_stub!(double_fault, DoubleFault, error_code);
exception_stub!(invalid_tss, InvalidTss, error_code);
exception_stub!(segment_not_present, SegmentNotPresent, error_code);
exception_stub!(stack_segment_fault, StackSegmentFault, error_code);
exception_stub!(general_protection_fault, GeneralProtectionFault, error_code);
exception_stub!(page_fault, PageFault, error_code);
exception_stub!(x87_floating_point, X87FloatingPoint);
exception_stub!(alignment_check, AlignmentCheck, error_code);
exception_stub!(machine_check, MachineCheck);
exception_stub!(simd_floating_point, SimdFloatingPoint);
exception_stub!(virtualization, Virtualization);
exception_stub!(security, Security, error_code);

#[unsafe(naked)]
extern "C" fn exception_tail() {
    naked_asm!(
        "cld",
        "push esp",
        "call {report}",
        "2:",
        "cli",
        "hlt",
        "jmp 2b",
        report = sym report_exception,
    );
}

extern "C" fn report_exception(frame: &ExceptionFrame) -> ! {
    let vector = u8::try_from(frame.vector).ok();
    let (mnemonic, description) = vector
        .and_then(Exception::from_vector)
        .map_or(("#??", "unknown exception"), |e| (e.mnemonic(), e.description()));

    let cr2 = if vector == Some(Exception::PageFault.vector()) {
        read_cr2()
    } else {
        0
    };

    early_panic(format_args!(
        "{mnemonic} {description} (vector {}, error code {:#x}) at {:#06x}:{:#010x}, eflags {:#010x}, cr2 {cr2:#010x}",
        frame.vector, frame.error_code, frame.cs, frame.eip, frame.eflags
    ))
}

fn read_cr2() -> u32 {
    let cr2: u32;
    // SAFETY: Reading CR2 has no side effects.
    unsafe {
        core::arch::asm!("mov {}, cr2", out(reg) cr2, options(nomem, nostack, preserves_flags));
    }
    cr2
}

/// Installed in every slot without a dedicated handler. Never returns, so a
/// reserved exception's error code is never mistaken for a return address.
#[unsafe(naked)]
extern "C" fn default_interrupt() {
    naked_asm!(
        "cld",
        "push esp",
        "call {report}",
        "2:",
        "cli",
        "hlt",
        "jmp 2b",
        report = sym report_unhandled,
    );
}

extern "C" fn report_unhandled(stack: *const [u32; 3]) -> ! {
    // SAFETY: The CPU pushed at least three dwords before entering the handler.
    let stack = unsafe { stack.read() };
    early_panic(format_args!("{}", UnhandledInterrupt { stack }))
}

#[allow(clippy::fn_to_numeric_cast, clippy::cast_possible_truncation)]
fn address(stub: extern "C" fn()) -> u32 {
    stub as usize as u32
}

fn stub(exception: Exception) -> extern "C" fn() {
    match exception {
        Exception::DivideByZero => divide_by_zero,
        Exception::Debug => debug,
        Exception::NonMaskableInterrupt => non_maskable_interrupt,
        Exception::Breakpoint => breakpoint,
        Exception::Overflow => overflow,
        Exception::BoundRangeExceeded => bound_range_exceeded,
        Exception::InvalidOpcode => invalid_opcode,
        Exception::DeviceNotAvailable => device_not_available,
        Exception::DoubleFault => double_fault,
        Exception::InvalidTss => invalid_tss,
        Exception::SegmentNotPresent => segment_not_present,
        Exception::StackSegmentFault => stack_segment_fault,
        Exception::GeneralProtectionFault => general_protection_fault,
        Exception::PageFault => page_fault,
        Exception::X87FloatingPoint => x87_floating_point,
        Exception::AlignmentCheck => alignment_check,
        Exception::MachineCheck => machine_check,
        Exception::SimdFloatingPoint => simd_floating_point,
        Exception::Virtualization => virtualization,
        Exception::Security => security,
    }
}

/// Handler addresses for [`kernel_interrupts::Cpu::driver_init`].
pub fn exception_handlers() -> ExceptionHandlers {
    ExceptionHandlers::from_fn(address(default_interrupt), |e| address(stub(e)))
}
