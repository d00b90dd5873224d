//! The PID 1 state machine: one-time setup, then the steady loop.

use nix::errno::Errno;
use nix::sys::signal::SigSet;
use nix::unistd::{Pid, getpid, setsid};
use std::path::Path;
use std::thread;

use crate::args::ArgVector;
use crate::config::Config;
use crate::kernel::Kernel;
use crate::power;
use crate::supervisor::{self, Outcome, SpawnRequest};
use crate::update::{self, UpdateStatus};
use crate::{env, fd, fs, signals};
use crate::{log_info, log_warn};

/// Errors that abort setup. For PID 1 exiting means a kernel panic.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("must run as pid 1 (running as pid {0})")]
    NotPid1(i32),

    #[error("sigprocmask: {0}")]
    SignalMask(Errno),
}

/// Prepare the machine and return the signal mask children should get.
///
/// Refuses to do anything unless the caller is PID 1. Mount and descriptor
/// failures are logged and tolerated.
pub fn setup<K: Kernel>(kernel: &K, args: &mut ArgVector<'_>) -> Result<SigSet, InitError> {
    let pid = getpid();
    if pid != Pid::from_raw(1) {
        return Err(InitError::NotPid1(pid.as_raw()));
    }

    let _ = setsid();

    init_system(kernel, Path::new("/"), &fd::STANDARD);
    if let Err(e) = std::env::set_current_dir("/") {
        log_warn!("chdir(/): {e}");
    }
    env::ensure_term();
    args.scrub();
    fs::remove_self_image();

    signals::block_all().map_err(InitError::SignalMask)
}

/// Lay out the filesystem below `root`, bind `bindings`, then log what
/// went wrong while laying it out.
///
/// Mount failures happen before descriptor 2 points anywhere useful, so
/// they are only written once the bindings are in place.
pub fn init_system<K: Kernel>(kernel: &K, root: &Path, bindings: &[fd::Binding]) -> fs::FsReport {
    let report = fs::init_fs(kernel, root);
    fd::bind_fds(bindings);
    report.log();
    report
}

/// Where a steady iteration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Both workloads ran, nothing else was requested.
    Steady,
    /// A new kernel was staged and the kexec reboot issued.
    Updated,
    /// The reboot marker was found and the reboot issued.
    RebootRequested,
}

pub struct ControlLoop<K> {
    kernel: K,
    config: Config,
    child_mask: SigSet,
}

impl<K: Kernel> ControlLoop<K> {
    pub fn new(kernel: K, config: Config, child_mask: SigSet) -> Self {
        Self {
            kernel,
            config,
            child_mask,
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Alternate iterations and the idle delay forever.
    pub fn run(&self) -> ! {
        loop {
            self.run_iteration();
            thread::sleep(self.config.idle);
        }
    }

    /// One pass: boot workload, reboot workload, update check, reboot marker.
    ///
    /// Each workload runs to completion regardless of how the previous one
    /// ended. A staged update ends the pass before the marker is looked at.
    pub fn run_iteration(&self) -> Step {
        self.run_program(&self.config.boot);
        self.run_program(&self.config.reboot);

        if update::check_update(&self.kernel, &self.config) == UpdateStatus::Staged {
            return Step::Updated;
        }

        if power::check_reboot_request(&self.kernel, &self.config.reboot_marker) {
            return Step::RebootRequested;
        }

        Step::Steady
    }

    fn run_program(&self, program: &Path) {
        let request = SpawnRequest::new(program, self.child_mask);
        match supervisor::supervise(request) {
            Ok(Outcome::Exited(code)) => {
                log_info!("{} exited with status {code}", program.display());
            }
            Ok(Outcome::Signaled(sig)) => {
                log_warn!("{} killed by {sig:?}", program.display());
            }
            // Already logged by the supervisor.
            Err(_) => {}
        }
    }
}
