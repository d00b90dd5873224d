//! Sequential child supervision.
//!
//! PID 1 runs with every signal blocked. Children get the mask PID 1 started
//! with and their own session, then PID 1 blocks in `waitpid(-1)` until that
//! child terminates, reaping any orphan that happens to exit in the meantime.

use nix::errno::Errno;
use nix::sys::signal::{SigSet, SigmaskHow, Signal, sigprocmask};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{Pid, setsid};
use std::ffi::OsString;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;

use crate::log::{self, Level};
use crate::{log_error, log_info};

/// A program to run once, to completion.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub program: PathBuf,
    /// Arguments after `argv[0]`, which is always `program`.
    pub args: Vec<OsString>,
    /// Signal mask installed in the child before exec.
    pub mask: SigSet,
}

impl SpawnRequest {
    pub fn new(program: impl Into<PathBuf>, mask: SigSet) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            mask,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// How a supervised child terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Exited(i32),
    Signaled(Signal),
}

#[derive(Debug, thiserror::Error)]
pub enum SuperviseError {
    #[error("spawn {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("waitpid: {0}")]
    Wait(Errno),
}

/// Run `request` and block until it exits or is killed.
///
/// Spawn and wait failures are logged here and returned; nothing is retried.
/// After a wait failure the child is no longer tracked.
#[allow(clippy::zombie_processes)] // reaped by `wait_for`
pub fn supervise(request: SpawnRequest) -> Result<Outcome, SuperviseError> {
    let SpawnRequest {
        program,
        args,
        mask,
    } = request;
    log_info!("Running {}", program.display());

    let mut command = Command::new(&program);
    command.args(&args);
    // SAFETY: sigprocmask and setsid are async-signal-safe and touch no
    // state shared with the parent.
    unsafe {
        command.pre_exec(move || {
            sigprocmask(SigmaskHow::SIG_SETMASK, Some(&mask), None)?;
            setsid()?;
            Ok(())
        });
    }

    let child = command.spawn().map_err(|source| {
        let level = spawn_failure_level(&source);
        let err = SuperviseError::Spawn {
            program: program.display().to_string(),
            source,
        };
        log::emit(level, format_args!("{err}"));
        err
    })?;

    let Ok(raw) = i32::try_from(child.id()) else {
        log_error!("pid {} out of range", child.id());
        return Err(SuperviseError::Wait(Errno::ESRCH));
    };

    wait_for(Pid::from_raw(raw)).map_err(|e| {
        log_error!("waitpid: {e}");
        SuperviseError::Wait(e)
    })
}

/// An absent workload is a normal configuration and is retried every pass,
/// so it is reported at info level. Anything else is an error.
fn spawn_failure_level(err: &io::Error) -> Level {
    if err.kind() == io::ErrorKind::NotFound {
        Level::Info
    } else {
        Level::Error
    }
}

/// Reap children with `waitpid(-1)` until `pid` exits or is killed.
///
/// Status changes of other children are discarded. `EINTR` is retried.
pub fn wait_for(pid: Pid) -> Result<Outcome, Errno> {
    loop {
        match waitpid(Pid::from_raw(-1), None) {
            Ok(WaitStatus::Exited(p, code)) if p == pid => return Ok(Outcome::Exited(code)),
            Ok(WaitStatus::Signaled(p, sig, _)) if p == pid => {
                return Ok(Outcome::Signaled(sig));
            }
            Ok(_) | Err(Errno::EINTR) => {}
            Err(e) => return Err(e),
        }
    }
}
