//! Privileged kernel calls.
//!
//! Everything that needs PID 1's privileges or that cannot be undone (mount,
//! kexec, mass kill, reboot) goes through [`Kernel`], so the control flow
//! around those calls can be driven by an unprivileged test double.

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::fs::File;
use std::path::Path;

use crate::fs::MountSpec;
use crate::power::RebootMode;
use crate::update::CommandLine;

/// Errors from staging a kernel with `kexec_file_load`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KexecError {
    #[error("kexec_file_load is not supported on this kernel")]
    Unsupported,

    #[error("kexec: {0}")]
    Rejected(Errno),
}

pub trait Kernel {
    /// Apply one mount table row at `target`.
    fn mount(&self, spec: &MountSpec, target: &Path) -> Result<(), Errno>;

    /// Stage `image` for a later `reboot(RebootMode::Kexec)`, without an
    /// initramfs.
    fn kexec_file_load(&self, image: &File, cmdline: &CommandLine) -> Result<(), KexecError>;

    /// Flush filesystem buffers to stable storage.
    fn sync(&self);

    /// Send SIGKILL to every process except the caller.
    fn kill_all(&self) -> Result<(), Errno>;

    /// Restart, power off, or jump into the staged kernel. Only returns on
    /// failure in production; [`RebootMode::None`] is a no-op.
    fn reboot(&self, mode: RebootMode) -> Result<(), Errno>;
}

/// The running Linux kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct Linux;

impl Kernel for Linux {
    fn mount(&self, spec: &MountSpec, target: &Path) -> Result<(), Errno> {
        nix::mount::mount(spec.source, target, spec.fstype, spec.flags, spec.data)
    }

    fn kexec_file_load(&self, image: &File, cmdline: &CommandLine) -> Result<(), KexecError> {
        kexec::file_load(image, cmdline)
    }

    fn sync(&self) {
        nix::unistd::sync();
    }

    fn kill_all(&self) -> Result<(), Errno> {
        kill(Pid::from_raw(-1), Signal::SIGKILL)
    }

    fn reboot(&self, mode: RebootMode) -> Result<(), Errno> {
        match mode.kernel_mode() {
            Some(how) => nix::sys::reboot::reboot(how).map(|_| ()),
            None => Ok(()),
        }
    }
}

#[cfg(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "riscv64",
    target_arch = "loongarch64",
    target_arch = "powerpc64",
    target_arch = "s390x"
))]
mod kexec {
    use super::{CommandLine, Errno, File, KexecError};
    use std::os::fd::AsRawFd;

    /// From `<linux/kexec.h>`.
    const KEXEC_FILE_NO_INITRAMFS: libc::c_ulong = 0x0000_0004;

    // libc only exports the number for some of these targets.
    #[cfg(all(target_arch = "x86_64", target_pointer_width = "64"))]
    const SYS_KEXEC_FILE_LOAD: libc::c_long = 320;
    #[cfg(all(target_arch = "x86_64", target_pointer_width = "32"))]
    const SYS_KEXEC_FILE_LOAD: libc::c_long = 0x4000_0000 + 320;
    #[cfg(any(
        target_arch = "aarch64",
        target_arch = "riscv64",
        target_arch = "loongarch64"
    ))]
    const SYS_KEXEC_FILE_LOAD: libc::c_long = 294;
    #[cfg(target_arch = "powerpc64")]
    const SYS_KEXEC_FILE_LOAD: libc::c_long = 382;
    #[cfg(target_arch = "s390x")]
    const SYS_KEXEC_FILE_LOAD: libc::c_long = 381;

    pub(super) fn file_load(image: &File, cmdline: &CommandLine) -> Result<(), KexecError> {
        let bytes = cmdline.as_bytes_with_nul();
        let no_initrd: libc::c_int = -1;
        // SAFETY: the image descriptor is open for the duration of the call and
        // `bytes` is a NUL-terminated buffer of exactly `bytes.len()` bytes.
        let ret = unsafe {
            libc::syscall(
                SYS_KEXEC_FILE_LOAD,
                image.as_raw_fd(),
                no_initrd,
                bytes.len() as libc::c_ulong,
                bytes.as_ptr(),
                KEXEC_FILE_NO_INITRAMFS,
            )
        };

        match Errno::result(ret) {
            Ok(_) => Ok(()),
            Err(Errno::ENOSYS) => Err(KexecError::Unsupported),
            Err(e) => Err(KexecError::Rejected(e)),
        }
    }

}

#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "riscv64",
    target_arch = "loongarch64",
    target_arch = "powerpc64",
    target_arch = "s390x"
)))]
mod kexec {
    use super::{CommandLine, File, KexecError};

    pub(super) fn file_load(_image: &File, _cmdline: &CommandLine) -> Result<(), KexecError> {
        Err(KexecError::Unsupported)
    }
}
