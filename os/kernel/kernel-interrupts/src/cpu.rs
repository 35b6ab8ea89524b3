//! # CPU Interrupt Driver
//!
//! Owns the IDT and brings interrupt handling up in a fixed order:
//!
//! ```text
//! Uninitialized
//!   → InterruptsMasked      cli
//!   → IdtLoaded             every slot = default handler, lidt
//!   → ExceptionsInstalled   20 exception gates
//!   → PicConfigured         8259 remapped to 0x20/0x28, then fully masked
//!   → InterruptsEnabled     sti
//! ```
//!
//! Device handlers are added afterwards with [`Cpu::install_device`]. Every
//! mutation of the loaded table happens with interrupts masked.

use crate::cpuid::{self, CpuFeature, CpuidSource};
use crate::descriptor::{GateDescriptor, INTERRUPT32_TYPE, SYSTEM_CODE_SELECTOR};
use crate::exceptions::ExceptionHandlers;
use crate::idt::{Idt, Idtr};
use crate::pic::{InterruptController, PIC_IRQ_LINES};
use kernel_sync::{InterruptMask, IrqGuard};
use log::{debug, info, warn};

/// First vector used for device IRQs; IRQ `n` raises `DEVICE_INTERRUPT_BASE + n`.
pub const DEVICE_INTERRUPT_BASE: u8 = 0x20;

/// Vector of IRQ 8 on the slave PIC.
pub const SLAVE_INTERRUPT_BASE: u8 = DEVICE_INTERRUPT_BASE + 8;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum InterruptError {
    #[error("interrupt vector {index} is out of range")]
    VectorOutOfRange { index: u32 },
    #[error("IRQ {irq} is not served by the 8259 PIC")]
    IrqOutOfRange { irq: u8 },
    #[error("CPU driver not initialized ({state:?})")]
    NotInitialized { state: CpuState },
}

/// Privileged CPU operations the driver needs.
pub trait CpuControl: InterruptMask + CpuidSource {
    /// Load `idtr` into the IDTR register.
    ///
    /// # Safety
    /// `idtr` must describe a table of valid gates that outlives its use by the CPU.
    unsafe fn load_idt(&self, idtr: &Idtr);
}

/// Bring-up progress of the interrupt machinery. Only ever moves forward.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum CpuState {
    Uninitialized,
    InterruptsMasked,
    IdtLoaded,
    ExceptionsInstalled,
    PicConfigured,
    InterruptsEnabled,
}

/// The interrupt side of the boot CPU.
pub struct Cpu<C, P> {
    control: C,
    pic: P,
    idt: &'static mut Idt,
    state: CpuState,
    using_apic: bool,
}

impl<C: CpuControl, P: InterruptController> Cpu<C, P> {
    /// Take ownership of the IDT storage. Nothing touches the hardware yet.
    pub const fn new(control: C, pic: P, idt: &'static mut Idt) -> Self {
        Self {
            control,
            pic,
            idt,
            state: CpuState::Uninitialized,
            using_apic: false,
        }
    }

    /// Install the default and exception handlers, load the IDT, park the PIC
    /// and enable interrupts.
    ///
    /// A second call logs a warning and leaves everything as it is.
    ///
    /// # Errors
    /// None today; the `Result` leaves room for controller probing.
    pub fn driver_init(&mut self, handlers: &ExceptionHandlers) -> Result<(), InterruptError> {
        if self.state != CpuState::Uninitialized {
            warn!("CPU driver already initialized ({:?})", self.state);
            return Ok(());
        }

        self.control.disable_interrupts();
        self.state = CpuState::InterruptsMasked;

        self.idt.clear();
        for vector in 0..=u32::from(u8::MAX) {
            self.install_handler(
                vector,
                INTERRUPT32_TYPE,
                SYSTEM_CODE_SELECTOR,
                handlers.default_handler(),
            )?;
        }

        let idtr = self.idt.idtr();
        // SAFETY: Every slot now holds a present gate, and the table is 'static.
        unsafe { self.control.load_idt(&idtr) };
        self.state = CpuState::IdtLoaded;
        debug!("IDT loaded: {idtr:?}");

        for (exception, address) in handlers.iter() {
            self.install_handler(
                u32::from(exception.vector()),
                INTERRUPT32_TYPE,
                SYSTEM_CODE_SELECTOR,
                address,
            )?;
        }
        self.state = CpuState::ExceptionsInstalled;

        // TODO: detect an APIC here and keep the 8259 as fallback only.
        self.pic.initialize(DEVICE_INTERRUPT_BASE, SLAVE_INTERRUPT_BASE);
        self.pic.disable();
        self.state = CpuState::PicConfigured;

        info!(
            "CPU features: {}={} {}={}",
            CpuFeature::Fpu.name(),
            self.has_feature(CpuFeature::Fpu),
            CpuFeature::Apic.name(),
            self.has_feature(CpuFeature::Apic),
        );

        self.control.enable_interrupts();
        self.state = CpuState::InterruptsEnabled;
        info!("Interrupts enabled");
        Ok(())
    }

    /// Route `irq` to the handler at `address`.
    ///
    /// With the PIC in charge the line is unmasked afterwards. With the APIC
    /// flag set the line is left alone, as APIC routing does not exist yet.
    ///
    /// # Errors
    /// - [`InterruptError::NotInitialized`] before [`Cpu::driver_init`] finished,
    ///   as it would wipe the gate and re-mask the line.
    /// - [`InterruptError::IrqOutOfRange`] for lines the PIC does not serve.
    /// - [`InterruptError::VectorOutOfRange`] if `irq + 0x20` exceeds the table.
    pub fn install_device(&mut self, irq: u8, address: u32) -> Result<(), InterruptError> {
        if self.state != CpuState::InterruptsEnabled {
            return Err(InterruptError::NotInitialized { state: self.state });
        }
        if !self.using_apic && irq >= PIC_IRQ_LINES {
            return Err(InterruptError::IrqOutOfRange { irq });
        }

        let vector = u32::from(irq) + u32::from(DEVICE_INTERRUPT_BASE);
        self.install_handler(vector, INTERRUPT32_TYPE, SYSTEM_CODE_SELECTOR, address)?;

        if self.using_apic {
            warn!("APIC routing not implemented, IRQ {irq} (vector {vector:#04x}) stays masked");
        } else {
            self.pic.unmask_irq(irq);
            debug!("IRQ {irq} routed to vector {vector:#04x}");
        }
        Ok(())
    }

    /// Write one gate. The whole descriptor is replaced in a single store with
    /// interrupts masked.
    ///
    /// # Errors
    /// [`InterruptError::VectorOutOfRange`] if `index >= 256`; nothing is written.
    pub fn install_handler(
        &mut self,
        index: u32,
        flags: u8,
        selector: u16,
        address: u32,
    ) -> Result<(), InterruptError> {
        let vector = u8::try_from(index).map_err(|_| InterruptError::VectorOutOfRange { index })?;
        let descriptor = GateDescriptor::new(address, selector, flags);

        let _guard = IrqGuard::new(&self.control);
        self.idt.set(vector, descriptor);
        Ok(())
    }

    /// Switch device IRQ routing between the 8259 PIC and the APIC.
    pub fn set_using_apic(&mut self, using_apic: bool) {
        let _guard = IrqGuard::new(&self.control);
        self.using_apic = using_apic;
    }

    #[must_use]
    pub fn has_feature(&self, feature: CpuFeature) -> bool {
        cpuid::has_feature(&self.control, feature)
    }

    #[must_use]
    pub const fn state(&self) -> CpuState {
        self.state
    }

    #[must_use]
    pub const fn using_apic(&self) -> bool {
        self.using_apic
    }

    /// Decode the gate at `vector`.
    #[must_use]
    pub fn gate(&self, vector: u8) -> GateDescriptor {
        self.idt.get(vector)
    }

    /// The IDTR describing the owned table.
    #[must_use]
    pub fn idtr(&self) -> Idtr {
        self.idt.idtr()
    }

    pub const fn control(&self) -> &C {
        &self.control
    }

    pub const fn controller(&self) -> &P {
        &self.pic
    }
}

#[cfg(target_arch = "x86")]
mod x86 {
    use super::CpuControl;
    use crate::cpuid::{CpuidResult, CpuidSource, cpuid};
    use crate::idt::Idtr;
    use kernel_sync::{CpuInterruptMask, InterruptMask};

    /// The executing processor.
    #[derive(Debug, Default, Copy, Clone)]
    pub struct X86Cpu;

    impl InterruptMask for X86Cpu {
        fn interrupts_enabled(&self) -> bool {
            CpuInterruptMask.interrupts_enabled()
        }

        fn disable_interrupts(&self) {
            CpuInterruptMask.disable_interrupts();
        }

        fn enable_interrupts(&self) {
            CpuInterruptMask.enable_interrupts();
        }
    }

    impl CpuidSource for X86Cpu {
        fn cpuid(&self, leaf: u32) -> CpuidResult {
            // SAFETY: The kernel requires at least an i586.
            unsafe { cpuid(leaf) }
        }
    }

    impl CpuControl for X86Cpu {
        unsafe fn load_idt(&self, idtr: &Idtr) {
            unsafe {
                core::arch::asm!("lidt [{}]", in(reg) core::ptr::from_ref(idtr), options(nostack, preserves_flags, readonly));
            }
        }
    }
}

#[cfg(target_arch = "x86")]
pub use x86::X86Cpu;
