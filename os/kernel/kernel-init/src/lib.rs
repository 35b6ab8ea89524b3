//! # Early Kernel Initialization
//!
//! Sequences the steps between the multiboot handoff and a kernel that has a
//! physical block allocator and live paging:
//!
//! ```text
//! banner
//!   → boot information (fatal if unrecognized)
//!   → ACPI pointers     (warning, or fatal with parameters)
//!   → block allocator   (fatal without usable memory)
//!   → paging
//!   → KernelParams      (parameter variant only)
//! ```
//!
//! Two entry points exist. [`kernel_early_init`] only brings up memory and
//! treats missing ACPI information as a degraded boot.
//! [`kernel_early_init_with_params`] additionally fills the [`KernelParams`]
//! handoff block and refuses to boot without the RSDT and RSDP.
//!
//! Neither function halts on failure. Every fatal condition is returned as an
//! [`EarlyInitError`] for the caller to turn into an early panic.
//!
//! [`KernelParams`]: kernel_info::boot::KernelParams

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod boot_source;
mod early_init;
mod paging;

pub use boot_source::{BootInfoSource, MAX_MEMORY_REGIONS, MemoryMap};
pub use early_init::{
    EarlyInitError, KERNEL_NAME, KERNEL_VERSION, early_welcome_message, kernel_early_init,
    kernel_early_init_with_params,
};
pub use paging::Paging;
