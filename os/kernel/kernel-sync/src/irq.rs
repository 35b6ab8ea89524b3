/// Capability to mask and unmask maskable hardware interrupts on the local CPU.
///
/// This is the only mutual-exclusion primitive the early boot path needs: a
/// single core, no tasks, and interrupt handlers as the only thing that can
/// observe a half-finished update.
///
/// The hardware implementation is [`CpuInterruptMask`] (`cli`/`sti`); tests
/// provide their own recording implementations.
pub trait InterruptMask {
    /// Whether maskable interrupts are currently enabled (`EFLAGS.IF`).
    fn interrupts_enabled(&self) -> bool;

    /// Disable maskable interrupts. Idempotent.
    fn disable_interrupts(&self);

    /// Enable maskable interrupts. Idempotent.
    fn enable_interrupts(&self);
}

impl<M: InterruptMask + ?Sized> InterruptMask for &M {
    #[inline]
    fn interrupts_enabled(&self) -> bool {
        (**self).interrupts_enabled()
    }

    #[inline]
    fn disable_interrupts(&self) {
        (**self).disable_interrupts();
    }

    #[inline]
    fn enable_interrupts(&self) {
        (**self).enable_interrupts();
    }
}

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// `IrqGuard::new()` snapshots the interrupt flag. If interrupts were enabled,
/// it disables them. On drop, it re-enables them **only** if they were
/// previously enabled, preserving the original state on every exit path.
///
/// # Examples
///
/// ```
/// use core::cell::Cell;
/// use kernel_sync::{InterruptMask, IrqGuard};
///
/// struct FakeCpu(Cell<bool>);
///
/// impl InterruptMask for FakeCpu {
///     fn interrupts_enabled(&self) -> bool { self.0.get() }
///     fn disable_interrupts(&self) { self.0.set(false) }
///     fn enable_interrupts(&self) { self.0.set(true) }
/// }
///
/// let cpu = FakeCpu(Cell::new(true));
/// {
///     let _g = IrqGuard::new(&cpu);
///     assert!(!cpu.interrupts_enabled());
/// }
/// assert!(cpu.interrupts_enabled());
/// ```
#[must_use = "interrupts are restored as soon as the guard is dropped"]
pub struct IrqGuard<'a, M: InterruptMask + ?Sized> {
    mask: &'a M,
    /// Whether interrupts were enabled (IF=1) when the guard was created.
    were_enabled: bool,
}

impl<'a, M: InterruptMask + ?Sized> IrqGuard<'a, M> {
    /// Disables interrupts if they are currently enabled and remembers the state.
    #[inline]
    pub fn new(mask: &'a M) -> Self {
        let enabled = mask.interrupts_enabled();
        if enabled {
            mask.disable_interrupts();
        }
        Self {
            mask,
            were_enabled: enabled,
        }
    }

    /// Whether interrupts will be re-enabled when this guard drops.
    #[inline]
    #[must_use]
    pub const fn restores_interrupts(&self) -> bool {
        self.were_enabled
    }
}

impl<M: InterruptMask + ?Sized> Drop for IrqGuard<'_, M> {
    /// Restores interrupts only if they were previously enabled.
    fn drop(&mut self) {
        if self.were_enabled {
            self.mask.enable_interrupts();
        }
    }
}

/// Run `f` with interrupts masked, restoring the previous state afterwards.
#[inline]
pub fn without_interrupts<M, R>(mask: &M, f: impl FnOnce() -> R) -> R
where
    M: InterruptMask + ?Sized,
{
    let _guard = IrqGuard::new(mask);
    f()
}

/// `EFLAGS.IF`.
pub const EFLAGS_IF: u32 = 1 << 9;

#[cfg(target_arch = "x86")]
pub use cpu::{CpuInterruptMask, cli_stop_interrupts, eflags, sti_enable_interrupts};

#[cfg(target_arch = "x86")]
mod cpu {
    use super::{EFLAGS_IF, InterruptMask};

    /// Disables hardware interrupts (`cli`).
    ///
    /// # Safety & Privilege
    ///
    /// Must only be executed at CPL0 (or with sufficient IOPL).
    #[inline]
    pub fn cli_stop_interrupts() {
        unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
    }

    /// Enables hardware interrupts (`sti`).
    ///
    /// # Safety & Privilege
    ///
    /// Must only be executed at CPL0, and only once a valid IDT is loaded.
    #[inline]
    pub fn sti_enable_interrupts() {
        unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
    }

    /// Returns the current `EFLAGS` value (via `pushfd/pop`).
    #[inline]
    #[must_use]
    pub fn eflags() -> u32 {
        let r: u32;
        unsafe { core::arch::asm!("pushfd", "pop {}", out(reg) r, options(preserves_flags)) }
        r
    }

    /// The local CPU's interrupt flag.
    #[derive(Debug, Default, Copy, Clone)]
    pub struct CpuInterruptMask;

    impl InterruptMask for CpuInterruptMask {
        #[inline]
        fn interrupts_enabled(&self) -> bool {
            eflags() & EFLAGS_IF != 0
        }

        #[inline]
        fn disable_interrupts(&self) {
            cli_stop_interrupts();
        }

        #[inline]
        fn enable_interrupts(&self) {
            sti_enable_interrupts();
        }
    }
}
