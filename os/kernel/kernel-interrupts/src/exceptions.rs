//! # Architectural Exceptions
//!
//! The 20 processor exceptions that get a dedicated handler. Vectors 9
//! (coprocessor segment overrun), 15, 21–29 and 31 are reserved or obsolete
//! and keep the default handler.

/// Number of exceptions with a dedicated handler.
pub const EXCEPTION_COUNT: usize = 20;

/// A processor exception with a dedicated handler.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Exception {
    DivideByZero = 0,
    Debug = 1,
    NonMaskableInterrupt = 2,
    Breakpoint = 3,
    Overflow = 4,
    BoundRangeExceeded = 5,
    InvalidOpcode = 6,
    DeviceNotAvailable = 7,
    DoubleFault = 8,
    InvalidTss = 10,
    SegmentNotPresent = 11,
    StackSegmentFault = 12,
    GeneralProtectionFault = 13,
    PageFault = 14,
    X87FloatingPoint = 16,
    AlignmentCheck = 17,
    MachineCheck = 18,
    SimdFloatingPoint = 19,
    Virtualization = 20,
    Security = 30,
}

/// Every exception, in vector order.
pub const EXCEPTIONS: [Exception; EXCEPTION_COUNT] = [
    Exception::DivideByZero,
    Exception::Debug,
    Exception::NonMaskableInterrupt,
    Exception::Breakpoint,
    Exception::Overflow,
    Exception::BoundRangeExceeded,
    Exception::InvalidOpcode,
    Exception::DeviceNotAvailable,
    Exception::DoubleFault,
    Exception::InvalidTss,
    Exception::SegmentNotPresent,
    Exception::StackSegmentFault,
    Exception::GeneralProtectionFault,
    Exception::PageFault,
    Exception::X87FloatingPoint,
    Exception::AlignmentCheck,
    Exception::MachineCheck,
    Exception::SimdFloatingPoint,
    Exception::Virtualization,
    Exception::Security,
];

impl Exception {
    #[inline]
    #[must_use]
    pub const fn vector(self) -> u8 {
        self as u8
    }

    /// Position of this exception in [`EXCEPTIONS`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self.vector() {
            v @ 0..=8 => v as usize,
            v @ 10..=14 => v as usize - 1,
            v @ 16..=20 => v as usize - 2,
            _ => EXCEPTION_COUNT - 1,
        }
    }

    /// The exception raised at `vector`, if it has a dedicated handler.
    #[must_use]
    pub fn from_vector(vector: u8) -> Option<Self> {
        EXCEPTIONS.into_iter().find(|e| e.vector() == vector)
    }

    /// Whether the CPU pushes an error code before entering the handler.
    #[must_use]
    pub const fn has_error_code(self) -> bool {
        matches!(
            self,
            Self::DoubleFault
                | Self::InvalidTss
                | Self::SegmentNotPresent
                | Self::StackSegmentFault
                | Self::GeneralProtectionFault
                | Self::PageFault
                | Self::AlignmentCheck
                | Self::Security
        )
    }

    /// Mnemonic, e.g. `#PF`.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::DivideByZero => "#DE",
            Self::Debug => "#DB",
            Self::NonMaskableInterrupt => "NMI",
            Self::Breakpoint => "#BP",
            Self::Overflow => "#OF",
            Self::BoundRangeExceeded => "#BR",
            Self::InvalidOpcode => "#UD",
            Self::DeviceNotAvailable => "#NM",
            Self::DoubleFault => "#DF",
            Self::InvalidTss => "#TS",
            Self::SegmentNotPresent => "#NP",
            Self::StackSegmentFault => "#SS",
            Self::GeneralProtectionFault => "#GP",
            Self::PageFault => "#PF",
            Self::X87FloatingPoint => "#MF",
            Self::AlignmentCheck => "#AC",
            Self::MachineCheck => "#MC",
            Self::SimdFloatingPoint => "#XM",
            Self::Virtualization => "#VE",
            Self::Security => "#SX",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::DivideByZero => "divide by zero",
            Self::Debug => "debug trap",
            Self::NonMaskableInterrupt => "non-maskable interrupt",
            Self::Breakpoint => "breakpoint",
            Self::Overflow => "overflow",
            Self::BoundRangeExceeded => "bound range exceeded",
            Self::InvalidOpcode => "invalid opcode",
            Self::DeviceNotAvailable => "device not available",
            Self::DoubleFault => "double fault",
            Self::InvalidTss => "invalid TSS",
            Self::SegmentNotPresent => "segment not present",
            Self::StackSegmentFault => "stack segment fault",
            Self::GeneralProtectionFault => "general protection fault",
            Self::PageFault => "page fault",
            Self::X87FloatingPoint => "x87 floating point exception",
            Self::AlignmentCheck => "alignment check",
            Self::MachineCheck => "machine check",
            Self::SimdFloatingPoint => "SIMD floating point exception",
            Self::Virtualization => "virtualization exception",
            Self::Security => "security exception",
        }
    }
}

/// Handler addresses installed by [`crate::cpu::Cpu::driver_init`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ExceptionHandlers {
    default: u32,
    exceptions: [u32; EXCEPTION_COUNT],
}

impl ExceptionHandlers {
    /// `default` for every slot, `handler(e)` for each exception.
    #[must_use]
    pub fn from_fn(default: u32, mut handler: impl FnMut(Exception) -> u32) -> Self {
        let mut exceptions = [0; EXCEPTION_COUNT];
        for (slot, e) in exceptions.iter_mut().zip(EXCEPTIONS) {
            *slot = handler(e);
        }
        Self { default, exceptions }
    }

    /// Address of the handler for every vector without a dedicated one.
    #[inline]
    #[must_use]
    pub const fn default_handler(&self) -> u32 {
        self.default
    }

    #[inline]
    #[must_use]
    pub const fn handler(&self, exception: Exception) -> u32 {
        self.exceptions[exception.index()]
    }

    /// `(exception, handler address)` pairs in vector order.
    pub fn iter(&self) -> impl Iterator<Item = (Exception, u32)> + '_ {
        EXCEPTIONS.into_iter().zip(self.exceptions.iter().copied())
    }
}
