//! Environment normalization.

use std::ffi::OsStr;

/// Terminal type assumed for the kernel console.
pub const DEFAULT_TERM: &str = "linux";

/// Set `TERM` unless the kernel command line already provided one.
pub fn ensure_term() {
    ensure_var("TERM", DEFAULT_TERM);
}

/// Set `key` to `value` if it is absent. An existing value, even an empty
/// one, is kept.
pub fn ensure_var(key: &str, value: impl AsRef<OsStr>) {
    if std::env::var_os(key).is_some() {
        return;
    }
    // SAFETY: called during setup, before any other thread exists.
    unsafe {
        std::env::set_var(key, value);
    }
}
