//! This module implements the hypervisor detection on top of [`CpuidOps`].

use bit_field::BitField;

use crate::cpuid::{CpuidOps, NativeCpuid};

const CPUID_VENDOR_AND_MAX_FUNCTIONS: u32 = 0x0;
const CPUID_PROCESSOR_INFO_AND_FEATURE_BITS: u32 = 0x1;

// See: (AMD) CPUID Fn0000_0001_ECX Feature Identifiers, bit 31 "Reserved for use by hypervisor"
// See: (Intel) Table 3-10. Feature Information Returned in the ECX Register
const HYPERVISOR_PRESENT_BIT: usize = 31;

/// Reasons the hypervisor present bit could not be read.
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectError {
    /// The target architecture has no CPUID instruction.
    #[error("the CPUID instruction is unavailable on this architecture")]
    CpuidUnavailable,

    /// The processor does not implement the leaf that holds the bit.
    #[error("CPUID leaf `{leaf:#x}` is unsupported (the highest basic leaf is `{max_leaf:#x}`)")]
    LeafUnsupported {
        /// The leaf that was needed.
        leaf: u32,
        /// The highest basic leaf the processor reports.
        max_leaf: u32,
    },
}

/// Answers whether the current execution environment is virtualized.
///
/// The detector holds no state; every query executes CPUID again and nothing
/// is cached.
#[derive(Clone, Copy, Debug, Default)]
pub struct HypervisorDetector<T = NativeCpuid> {
    ops: T,
}

impl HypervisorDetector {
    /// Creates a detector that executes CPUID on the current processor.
    #[must_use]
    pub const fn new() -> Self {
        Self { ops: NativeCpuid }
    }
}

impl<T: CpuidOps> HypervisorDetector<T> {
    /// Creates a detector that obtains CPUID results from `ops`.
    #[must_use]
    pub const fn with_ops(ops: T) -> Self {
        Self { ops }
    }

    /// Tests whether the processor reports that it is running under a
    /// hypervisor. Returns `false` if that cannot be determined.
    #[must_use]
    pub fn is_hypervisor(&self) -> bool {
        self.try_detect().unwrap_or_else(|e| {
            log::debug!("Assuming no hypervisor: {e}");
            false
        })
    }

    /// Reads CPUID.1:ECX[31] after making sure leaf 1 is implemented.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::CpuidUnavailable`] when CPUID does not exist on
    /// the target, and [`DetectError::LeafUnsupported`] when the processor does
    /// not implement leaf 1.
    pub fn try_detect(&self) -> Result<bool, DetectError> {
        let max_leaf = self
            .ops
            .cpuid(CPUID_VENDOR_AND_MAX_FUNCTIONS)
            .ok_or(DetectError::CpuidUnavailable)?
            .eax;
        if max_leaf < CPUID_PROCESSOR_INFO_AND_FEATURE_BITS {
            return Err(DetectError::LeafUnsupported {
                leaf: CPUID_PROCESSOR_INFO_AND_FEATURE_BITS,
                max_leaf,
            });
        }

        let regs = self
            .ops
            .cpuid(CPUID_PROCESSOR_INFO_AND_FEATURE_BITS)
            .ok_or(DetectError::CpuidUnavailable)?;
        let present = regs.ecx.get_bit(HYPERVISOR_PRESENT_BIT);
        log::trace!("CPUID.1:ECX = {:#010x}, hypervisor present: {present}", regs.ecx);
        Ok(present)
    }
}
