//! # QEMU Debug Console Output
//!
//! Kernel-side output through QEMU's debug console, the only "terminal" the
//! early-boot kernel has. Every byte written to I/O port `0x402` shows up on
//! the host, e.g. with `qemu-system-i386 -kernel kernel.elf -debugcon stdio`.
//!
//! ```text
//! log::info!(..) / qemu_trace!(..)
//!     ↓
//! QemuLogger (log::Log)   "[INFO] kernel_init: ..."
//!     ↓
//! QemuSink (fmt::Write)
//!     ↓
//! dbg_putc() → I/O port 0x402 → host
//! ```
//!
//! ## Features
//!
//! - `enabled` (default): bytes go to the port. Without it, all output is
//!   discarded and no port I/O is compiled in.
//!
//! On architectures other than i386 (host tests) the sink discards output.
//!
//! ## Usage
//! ```rust,no_run
//! use kernel_qemu::QemuLogger;
//! use log::info;
//!
//! QemuLogger::new(kernel_qemu::default_level()).init().ok();
//! info!("Kernel subsystem initialized");
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::{QemuLogger, default_level, write_record};

#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt::{self, Write};

    /// QEMU's debug console port.
    pub const QEMU_DEBUG_PORT: u16 = 0x402;

    /// Write a single byte to QEMU's debug console.
    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn dbg_putc(c: u8) {
        #[cfg(all(feature = "enabled", target_arch = "x86"))]
        unsafe {
            core::arch::asm!(
                "out dx, al",
                in("dx") QEMU_DEBUG_PORT,
                in("al") c,
                options(nomem, nostack, preserves_flags)
            );
        }
        #[cfg(not(all(feature = "enabled", target_arch = "x86")))]
        let _ = c;
    }

    /// `fmt::Write` adapter over [`dbg_putc`].
    pub struct QemuSink;

    impl Write for QemuSink {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            s.bytes().for_each(dbg_putc);
            Ok(())
        }
    }

    #[doc(hidden)]
    #[inline]
    pub fn qemu_write(args: fmt::Arguments) {
        // Best-effort debug output.
        let _ = fmt::write(&mut QemuSink, args);
    }
}

/// `print!`-style output straight to the debug console, bypassing `log`.
#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}
