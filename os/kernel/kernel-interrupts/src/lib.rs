//! # i386 Interrupt Handling
//!
//! Everything needed to take interrupts on a 32-bit x86 CPU during early boot:
//!
//! - [`gdt`]: the flat segment table the gates' code selector points into,
//! - [`descriptor`]: the 8-byte gate descriptor and its attribute byte,
//! - [`idt`]: the 256-slot table and the `lidt` operand,
//! - [`exceptions`]: the architectural exceptions with dedicated handlers,
//! - [`pic`]: the legacy 8259A pair behind the [`InterruptController`] seam,
//! - [`cpuid`]: feature probing,
//! - [`cpu`]: the driver tying it together.
//!
//! ## Acronyms
//! - **IDT**: *Interrupt Descriptor Table*
//! - **IDTR**: the register holding the IDT base and limit
//! - **PIC**: *Programmable Interrupt Controller* (8259A)
//! - **GDT**: *Global Descriptor Table*
//! - **DPL**: *Descriptor Privilege Level*
//!
//! Hardware access goes through [`cpu::CpuControl`] and [`pic::PortIo`]; the
//! real implementations exist only when compiling for `target_arch = "x86"`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod cpu;
pub mod cpuid;
pub mod descriptor;
pub mod exceptions;
pub mod gdt;
pub mod idt;
pub mod pic;

pub use cpu::{Cpu, CpuControl, CpuState, DEVICE_INTERRUPT_BASE, InterruptError};
pub use cpuid::{CpuFeature, CpuidResult, CpuidSource};
pub use descriptor::{GateAttributes, GateDescriptor, INTERRUPT32_TYPE, SYSTEM_CODE_SELECTOR};
pub use exceptions::{EXCEPTIONS, Exception, ExceptionHandlers};
pub use gdt::{Gdt, KERNEL_CODE_SELECTOR, KERNEL_DATA_SELECTOR};
pub use idt::{Idt, Idtr};
pub use pic::{InterruptController, Pic8259, PortIo};

#[cfg(target_arch = "x86")]
pub use cpu::X86Cpu;
#[cfg(target_arch = "x86")]
pub use gdt::load_gdt;
#[cfg(target_arch = "x86")]
pub use pic::X86Ports;
