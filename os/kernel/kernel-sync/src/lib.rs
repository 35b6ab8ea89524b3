//! # Kernel synchronization primitives
//!
//! The early boot path runs on a single core with no tasks; the only thing
//! that can interleave with it is a hardware interrupt. Local interrupt
//! masking is therefore the whole synchronization story at this stage.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;

pub use irq::{InterruptMask, IrqGuard, without_interrupts};

#[cfg(target_arch = "x86")]
pub use irq::CpuInterruptMask;
