use core::fmt;
use kernel_qemu::qemu_trace;

/// Report a fatal condition and stop the machine.
///
/// Writes straight to the debug console so it works before a logger exists.
pub fn early_panic(reason: fmt::Arguments) -> ! {
    qemu_trace!("[PANIC]: {reason}\n");
    halt_forever()
}

/// An interrupt that reached the default handler.
///
/// The handler cannot tell whether the CPU pushed an error code, so the top
/// of the stack is shown raw: `EIP CS EFLAGS`, or `error EIP CS`.
pub struct UnhandledInterrupt {
    pub stack: [u32; 3],
}

impl fmt::Display for UnhandledInterrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.stack;
        write!(
            f,
            "unhandled interrupt or reserved exception, stack {a:#010x} {b:#010x} {c:#010x}"
        )
    }
}

/// `cli; hlt` forever.
pub fn halt_forever() -> ! {
    loop {
        #[cfg(target_arch = "x86")]
        unsafe {
            core::arch::asm!("cli", "hlt", options(nomem, nostack));
        }
        #[cfg(not(target_arch = "x86"))]
        core::hint::spin_loop();
    }
}
