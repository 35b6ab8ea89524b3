//! # Kernel Configuration and Boot Handoff
//!
//! This crate defines the memory layout constants and the boot handoff ABI
//! shared between the early-init path and the rest of the kernel. It is the
//! single source of truth for where things live, both before and after paging
//! is switched on.
//!
//! ## Overview
//!
//! The early-init code runs in three address-space regimes:
//!
//! 1. **Physical only**: right after the multiboot loader jumps to the kernel.
//!    Every pointer is a physical address.
//! 2. **Paging live**: after the paging subsystem returns. Physical memory is
//!    reachable through a fixed higher-half alias at [`memory::KERNEL_VIRTUAL_BASE`].
//! 3. **Handoff**: the populated [`boot::KernelParams`] block is passed on to
//!    later stages, with every pointer in it already translated.
//!
//! ## Virtual Memory Architecture
//!
//! ```text
//! Virtual Address Space Layout (32-bit):
//!
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │   Identity map of low memory    │
//!             │   (kept while booting)          │
//!             ├─────────────────────────────────┤
//!             │          (unmapped)             │
//! KERNEL_     ├─────────────────────────────────┤ 0xC000_0000
//! VIRTUAL_BASE│   Higher-half alias of          │
//!             │   physical memory [0, 1 GiB)    │
//! 0xFFFF_FFFF └─────────────────────────────────┘
//! ```
//!
//! ## Physical Memory Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │     Low Memory (< 1MiB)         │
//!             │  (BIOS, VGA, multiboot info)    │
//! PHYS_LOAD   ├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!             │       Kernel Image              │
//!             ├─────────────────────────────────┤ kernel end (4 KiB aligned)
//!             │    Block bitmap                 │
//!             ├─────────────────────────────────┤
//!             │    Available RAM                │
//!             │  (Managed by the block allocator)│
//!             └─────────────────────────────────┘
//! ```
//!
//! ## ABI Compatibility
//!
//! [`boot::KernelParams`] is `#[repr(C)]` and built from 32-bit fields only;
//! its size and field offsets are asserted at compile time.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
pub mod memory_map;
