#![allow(dead_code)]

use std::cell::RefCell;
use std::fs::File;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use init::config::Config;
use init::fs::MountSpec;
use init::kernel::{Kernel, KexecError};
use init::power::RebootMode;
use init::update::CommandLine;
use nix::errno::Errno;

/// Serialize tests that call `waitpid(-1)`: a wildcard wait in one test
/// would otherwise reap another test's child.
pub static WAIT_MUTEX: Mutex<()> = Mutex::new(());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Mount(&'static str),
    Kexec(Vec<u8>),
    Sync,
    KillAll,
    Reboot(RebootMode),
}

/// Kernel double recording every privileged call.
pub struct RecordingKernel {
    pub kexec: Result<(), KexecError>,
    /// Returned by every `mount`.
    pub mount: Result<(), Errno>,
    /// Returned by every `reboot`.
    pub reboot: Result<(), Errno>,
    pub calls: RefCell<Vec<Call>>,
}

impl RecordingKernel {
    pub fn new() -> Self {
        Self::with_kexec(Ok(()))
    }

    pub fn with_kexec(kexec: Result<(), KexecError>) -> Self {
        Self {
            kexec,
            mount: Ok(()),
            reboot: Ok(()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn failing_mounts(mut self, errno: Errno) -> Self {
        self.mount = Err(errno);
        self
    }

    pub fn failing_reboot(mut self, errno: Errno) -> Self {
        self.reboot = Err(errno);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }
}

impl Kernel for RecordingKernel {
    fn mount(&self, spec: &MountSpec, _target: &Path) -> Result<(), Errno> {
        self.calls.borrow_mut().push(Call::Mount(spec.target));
        self.mount
    }

    fn kexec_file_load(&self, _image: &File, cmdline: &CommandLine) -> Result<(), KexecError> {
        self.calls
            .borrow_mut()
            .push(Call::Kexec(cmdline.as_bytes_with_nul().to_vec()));
        self.kexec.clone()
    }

    fn sync(&self) {
        self.calls.borrow_mut().push(Call::Sync);
    }

    fn kill_all(&self) -> Result<(), Errno> {
        self.calls.borrow_mut().push(Call::KillAll);
        Ok(())
    }

    fn reboot(&self, mode: RebootMode) -> Result<(), Errno> {
        self.calls.borrow_mut().push(Call::Reboot(mode));
        self.reboot
    }
}

/// A scratch root holding workload scripts, a command line source, and
/// paths for the kernel image and reboot marker.
pub struct Sandbox {
    pub dir: tempfile::TempDir,
    pub config: Config,
    pub trace: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let trace = dir.path().join("trace");
        let config = Config {
            boot: dir.path().join("boot"),
            reboot: dir.path().join("reboot"),
            kernel_image: dir.path().join("kernel"),
            cmdline: dir.path().join("cmdline"),
            reboot_marker: dir.path().join("reboot.request"),
            idle: std::time::Duration::from_millis(10),
        };
        std::fs::write(&config.cmdline, b"console=ttyS0 root=/dev/vda\n").unwrap();
        Self { dir, config, trace }
    }

    /// Install a workload that appends `name` to the trace file.
    pub fn with_workloads(self) -> Self {
        write_script(
            &self.config.boot,
            &format!("echo boot >> {}", self.trace.display()),
        );
        write_script(
            &self.config.reboot,
            &format!("echo reboot >> {}", self.trace.display()),
        );
        self
    }

    pub fn trace(&self) -> String {
        std::fs::read_to_string(&self.trace).unwrap_or_default()
    }
}

/// Write an executable `/bin/sh` script.
pub fn write_script(path: &Path, body: &str) {
    std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}
