//! Standard descriptor wiring.
//!
//! The kernel starts PID 1 with no usable descriptors. Once `/dev` is
//! mounted, null, console and kmsg are bound to 0, 1 and 2 so both PID 1
//! and every child inherit a sane console.

use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use crate::log_warn;

/// A device node and the descriptor number it must occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub path: &'static str,
    pub target: RawFd,
}

/// Bound in this order, so a failure on 1 or 2 is still logged through
/// whatever 2 was last bound to.
pub const STANDARD: [Binding; 3] = [
    Binding {
        path: "/dev/null",
        target: 0,
    },
    Binding {
        path: "/dev/console",
        target: 1,
    },
    Binding {
        path: "/dev/kmsg",
        target: 2,
    },
];

/// Open `path` read-write and make it descriptor `target`.
///
/// On failure `target` is left as inherited.
pub fn bind_fd(path: &Path, target: RawFd) -> io::Result<()> {
    let fd: OwnedFd = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
        .open(path)?
        .into();

    if fd.as_raw_fd() == target {
        // std opens with O_CLOEXEC; children must inherit this one.
        // SAFETY: `fd` is a valid open descriptor owned by us.
        if unsafe { libc::fcntl(target, libc::F_SETFD, 0) } < 0 {
            return Err(io::Error::last_os_error());
        }
        let _ = fd.into_raw_fd();
        return Ok(());
    }

    // SAFETY: both descriptor numbers are valid; dup2 never touches `fd`
    // itself, which is closed when dropped below.
    if unsafe { libc::dup2(fd.as_raw_fd(), target) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Apply `bindings` in order, logging each failure and carrying on.
///
/// Production passes [`STANDARD`].
pub fn bind_fds(bindings: &[Binding]) {
    for binding in bindings {
        if let Err(e) = bind_fd(Path::new(binding.path), binding.target) {
            log_warn!("open({}): {e}", binding.path);
        }
    }
}
