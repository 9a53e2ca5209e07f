//! The module containing the CPUID abstraction and its build-time selected
//! implementation.

pub use raw_cpuid::CpuIdResult;

/// A source of CPUID results.
///
/// The detector only talks to the processor through this trait, so the way the
/// instruction is issued is chosen once per target, and tests can feed
/// prepared register values.
pub trait CpuidOps {
    /// Executes CPUID with `leaf` in EAX (and 0 in ECX).
    ///
    /// Returns `None` if the instruction does not exist on this target.
    fn cpuid(&self, leaf: u32) -> Option<CpuIdResult>;
}

/// Issues the CPUID instruction on the current processor.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeCpuid;

// The instruction is available only on x86 processors. Everything else falls
// back to reporting no result. `raw_cpuid::cpuid!` is not provided on 32-bit
// targets without SSE, where the instruction may also be missing altogether
// (pre-Pentium processors), so that case is checked through EFLAGS.ID first.
cfg_if::cfg_if! {
    if #[cfg(all(
        any(target_arch = "x86_64", all(target_arch = "x86", target_feature = "sse")),
        not(target_env = "sgx"),
    ))] {
        impl CpuidOps for NativeCpuid {
            fn cpuid(&self, leaf: u32) -> Option<CpuIdResult> {
                Some(raw_cpuid::cpuid!(leaf))
            }
        }
    } else if #[cfg(target_arch = "x86")] {
        impl CpuidOps for NativeCpuid {
            #[allow(unused_unsafe)]
            fn cpuid(&self, leaf: u32) -> Option<CpuIdResult> {
                use core::arch::x86::{__cpuid, has_cpuid};

                if !has_cpuid() {
                    return None;
                }
                let regs = unsafe { __cpuid(leaf) };
                Some(CpuIdResult {
                    eax: regs.eax,
                    ebx: regs.ebx,
                    ecx: regs.ecx,
                    edx: regs.edx,
                })
            }
        }
    } else {
        impl CpuidOps for NativeCpuid {
            fn cpuid(&self, _leaf: u32) -> Option<CpuIdResult> {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_arch = "x86_64")]
    fn native_reports_basic_leaves() {
        // Every x86-64 processor implements at least leaf 1.
        let regs = NativeCpuid.cpuid(0).unwrap();
        assert!(regs.eax >= 1);

        let regs = NativeCpuid.cpuid(1).unwrap();
        assert_ne!(regs.eax, 0, "family/model/stepping should not be zero");
    }

    #[test]
    #[cfg(target_arch = "x86")]
    fn native_follows_eflags_id() {
        // With or without SSE, a result is returned exactly when the processor
        // implements CPUID.
        assert_eq!(NativeCpuid.cpuid(0).is_some(), core::arch::x86::has_cpuid());
    }

    #[test]
    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    fn native_reports_nothing_without_cpuid() {
        assert!(NativeCpuid.cpuid(0).is_none());
        assert!(NativeCpuid.cpuid(1).is_none());
    }
}
