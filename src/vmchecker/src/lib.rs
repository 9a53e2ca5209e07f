//! Tells whether the current processor runs under a hypervisor.
//!
//! The check reads the hypervisor present bit, CPUID.1:ECX[31]. Hypervisors
//! conventionally set this bit for their guests, so it being set means this
//! program is executed inside of a virtual machine or container rather than a
//! real, physical machine. The bit is whatever the processor (or whoever
//! intercepts CPUID) reports and can be hidden or forged by privileged software.
//!
//! ```no_run
//! if vmchecker::is_hypervisor() {
//!     println!("Running under a hypervisor");
//! }
//! ```
//!
//! The crate is also built as a shared library exporting `bool
//! is_hypervisor(void)` with the C calling convention. See `include/vmchecker.h`.

mod cpuid;
mod detector;
pub mod ffi;

pub use cpuid::{CpuIdResult, CpuidOps, NativeCpuid};
pub use detector::{DetectError, HypervisorDetector};

/// Returns `true` if the current processor reports that it is running under a
/// hypervisor.
///
/// Returns `false` when no hypervisor is reported, and also when the check
/// cannot be made on this processor or architecture. Use
/// [`HypervisorDetector::try_detect`] to tell those apart.
#[must_use]
pub fn is_hypervisor() -> bool {
    HypervisorDetector::new().is_hypervisor()
}

// Only the integration tests load the shared library.
#[cfg(test)]
use libloading as _;

/// Routes `log` output of the library to the test harness.
#[cfg(test)]
fn init_test_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Trace)
        .try_init();
}
