//! # CPUID Feature Probing
//!
//! Only the two leaves early boot needs: leaf 0 for the highest supported
//! basic leaf, and leaf 1 for the classic EDX feature flags.

use bitfield_struct::bitfield;

/// Basic information: EAX = highest supported basic leaf.
pub const LEAF_BASIC: u32 = 0x00;

/// Feature information.
pub const LEAF_FEATURES: u32 = 0x01;

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
#[repr(C)]
pub struct CpuidResult {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

/// CPUID.01H:EDX, the subset of flags early boot looks at.
///
/// Reference: Intel SDM Vol. 2A, Table 3-11 "Feature Information Returned in EDX".
#[bitfield(u32)]
pub struct Leaf1Edx {
    /// On-chip x87 FPU.
    pub fpu: bool, // 0
    /// Virtual 8086 mode extensions.
    pub vme: bool, // 1
    /// Debugging extensions.
    pub de: bool, // 2
    /// Page size extensions (4 MiB pages).
    pub pse: bool, // 3
    /// Time stamp counter.
    pub tsc: bool, // 4
    /// RDMSR/WRMSR.
    pub msr: bool, // 5
    /// Physical address extensions.
    pub pae: bool, // 6
    /// Machine check exception.
    pub mce: bool, // 7
    /// CMPXCHG8B.
    pub cx8: bool, // 8
    /// On-chip APIC present and enabled.
    pub apic: bool, // 9
    #[bits(22)]
    __: u32,
}

/// A feature that can be tested with [`crate::cpu::Cpu::has_feature`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CpuFeature {
    Fpu,
    Apic,
}

impl CpuFeature {
    /// Bit mask of the feature in CPUID.01H:EDX.
    #[must_use]
    pub const fn edx_mask(self) -> u32 {
        match self {
            Self::Fpu => Leaf1Edx::new().with_fpu(true).into_bits(),
            Self::Apic => Leaf1Edx::new().with_apic(true).into_bits(),
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fpu => "FPU",
            Self::Apic => "APIC",
        }
    }
}

const _: () = assert!(CpuFeature::Fpu.edx_mask() == 1 << 0);
const _: () = assert!(CpuFeature::Apic.edx_mask() == 1 << 9);

/// Something that can execute `cpuid`.
pub trait CpuidSource {
    fn cpuid(&self, leaf: u32) -> CpuidResult;
}

/// Probe `feature`: leaf 0 must report at least one basic leaf before leaf 1 is read.
pub fn has_feature(source: &(impl CpuidSource + ?Sized), feature: CpuFeature) -> bool {
    if source.cpuid(LEAF_BASIC).eax == 0 {
        return false;
    }
    source.cpuid(LEAF_FEATURES).edx & feature.edx_mask() != 0
}

/// Execute `cpuid` with the given leaf and subleaf 0.
///
/// # Safety
/// The `cpuid` instruction must exist (any i586 or later).
#[cfg(target_arch = "x86")]
#[inline]
pub unsafe fn cpuid(leaf: u32) -> CpuidResult {
    let (mut eax, mut ecx) = (leaf, 0u32);
    let (ebx, edx): (u32, u32);
    unsafe {
        // EBX may be reserved by the compiler; shuttle it through EDI.
        core::arch::asm!(
            "push ebx",
            "cpuid",
            "mov edi, ebx",
            "pop ebx",
            out("edi") ebx,
            inlateout("eax") eax,
            inlateout("ecx") ecx,
            lateout("edx") edx,
            options(preserves_flags),
        );
    }
    CpuidResult { eax, ebx, ecx, edx }
}
