//! Paths and timings used by the control loop.
//!
//! The kernel passes boot parameters it does not recognise to PID 1 as
//! environment variables, so each default can be overridden from the kernel
//! command line.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BOOT: &str = "/etc/boot";
pub const DEFAULT_REBOOT: &str = "/etc/reboot";
pub const DEFAULT_KERNEL_IMAGE: &str = "/kernel";
pub const DEFAULT_CMDLINE: &str = "/proc/cmdline";
pub const DEFAULT_REBOOT_MARKER: &str = "/etc/reboot.request";
pub const DEFAULT_IDLE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Primary workload, run first on every iteration.
    pub boot: PathBuf,
    /// Secondary workload, run after the primary one completes.
    pub reboot: PathBuf,
    /// Candidate kernel image for the kexec update path.
    pub kernel_image: PathBuf,
    /// Source of the boot command line handed to a staged kernel.
    pub cmdline: PathBuf,
    /// Presence of this path requests a restart.
    pub reboot_marker: PathBuf,
    /// Delay between iterations.
    pub idle: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            boot: PathBuf::from(DEFAULT_BOOT),
            reboot: PathBuf::from(DEFAULT_REBOOT),
            kernel_image: PathBuf::from(DEFAULT_KERNEL_IMAGE),
            cmdline: PathBuf::from(DEFAULT_CMDLINE),
            reboot_marker: PathBuf::from(DEFAULT_REBOOT_MARKER),
            idle: DEFAULT_IDLE,
        }
    }
}

impl Config {
    /// Defaults with overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Defaults with overrides from `lookup`.
    ///
    /// Recognised keys: `INIT_BOOT`, `INIT_REBOOT`, `INIT_KERNEL`,
    /// `INIT_REBOOT_MARKER`, `INIT_IDLE_MS`. Empty or malformed values keep
    /// the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let path = |key: &str, default: PathBuf| match lookup(key) {
            Some(value) if !value.is_empty() => PathBuf::from(value),
            _ => default,
        };

        let defaults = Self::default();
        let idle = lookup("INIT_IDLE_MS")
            .and_then(|v| v.into_string().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.idle);

        Self {
            boot: path("INIT_BOOT", defaults.boot),
            reboot: path("INIT_REBOOT", defaults.reboot),
            kernel_image: path("INIT_KERNEL", defaults.kernel_image),
            cmdline: defaults.cmdline,
            reboot_marker: path("INIT_REBOOT_MARKER", defaults.reboot_marker),
            idle,
        }
    }
}
