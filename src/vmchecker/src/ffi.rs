//! The C ABI of this crate.
//!
//! When built as a `cdylib`, the functions here are exported from the shared
//! library (`vmchecker.dll`, `libvmchecker.so` or `libvmchecker.dylib`) and
//! declared in `include/vmchecker.h`.

use crate::HypervisorDetector;

/// Determines whether the running platform is under hypervisor mode, which
/// denotes this program is executed inside of a virtual machine or container
/// rather than a real, physical machine.
///
/// ```c
/// bool is_hypervisor(void);
/// ```
#[unsafe(no_mangle)]
pub extern "C" fn is_hypervisor() -> bool {
    HypervisorDetector::new().is_hypervisor()
}
