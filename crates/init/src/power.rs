//! Shutdown and reboot sequence.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use crate::kernel::Kernel;
use crate::{log_error, log_info, log_warn};

/// What to ask the kernel for once every other process is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootMode {
    /// Sync and kill only.
    None,
    PowerOff,
    Restart,
    /// Jump into the kernel staged by `kexec_file_load`.
    Kexec,
}

impl RebootMode {
    pub(crate) fn kernel_mode(self) -> Option<nix::sys::reboot::RebootMode> {
        use nix::sys::reboot::RebootMode as Rb;
        match self {
            RebootMode::None => None,
            RebootMode::PowerOff => Some(Rb::RB_POWER_OFF),
            RebootMode::Restart => Some(Rb::RB_AUTOBOOT),
            RebootMode::Kexec => Some(Rb::RB_KEXEC),
        }
    }

    /// Mode requested by the contents of a reboot marker file.
    pub fn from_request(contents: &str) -> Self {
        match contents.trim().to_ascii_lowercase().as_str() {
            "poweroff" | "halt" => RebootMode::PowerOff,
            _ => RebootMode::Restart,
        }
    }
}

impl fmt::Display for RebootMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RebootMode::None => "none",
            RebootMode::PowerOff => "poweroff",
            RebootMode::Restart => "restart",
            RebootMode::Kexec => "kexec",
        };
        f.write_str(name)
    }
}

/// Sync, kill every other process, then hand `mode` to the kernel.
///
/// Returns only if the kernel refuses (or `mode` is [`RebootMode::None`]);
/// the machine is then left with everything but PID 1 killed.
pub fn reboot<K: Kernel>(kernel: &K, mode: RebootMode) {
    log_info!("Syncing and terminating all processes ({mode})");
    kernel.sync();
    if let Err(e) = kernel.kill_all() {
        log_warn!("kill(-1): {e}");
    }

    if mode == RebootMode::None {
        return;
    }

    log_info!("Rebooting ({mode})...");
    if let Err(e) = kernel.reboot(mode) {
        log_error!("reboot: {e}");
    }
}

/// Reboot if the marker at `marker` exists.
///
/// The marker is removed first; the root filesystem survives the restart
/// and a stale marker would otherwise loop the machine. Returns whether a
/// reboot sequence was issued.
pub fn check_reboot_request<K: Kernel>(kernel: &K, marker: &Path) -> bool {
    if marker.symlink_metadata().is_err() {
        return false;
    }

    let mode = match fs::read_to_string(marker) {
        Ok(contents) => RebootMode::from_request(&contents),
        Err(_) => RebootMode::Restart,
    };
    log_info!("Found {}, requesting {mode}", marker.display());

    match fs::remove_file(marker) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log_warn!("unlink({}): {e}", marker.display()),
    }

    reboot(kernel, mode);
    true
}
