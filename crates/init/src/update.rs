//! Live kernel updates via kexec.
//!
//! A new kernel image dropped at the configured path is staged with
//! `kexec_file_load`, reusing the running kernel's command line, and the
//! machine reboots straight into it. The image is never moved or deleted.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::kernel::{Kernel, KexecError};
use crate::power::{self, RebootMode};
use crate::{log_error, log_info, log_warn};

/// Size of the kernel command line buffer, terminating NUL included.
pub const COMMAND_LINE_SIZE: usize = 2048;

/// A captured boot command line.
///
/// Always NUL-terminated, never longer than [`COMMAND_LINE_SIZE`] bytes
/// including the terminator, and free of interior NULs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    bytes: Vec<u8>,
}

impl CommandLine {
    /// Read at most `COMMAND_LINE_SIZE - 1` bytes from `path`.
    pub fn read(path: &Path) -> io::Result<Self> {
        let mut buf = Vec::with_capacity(COMMAND_LINE_SIZE);
        File::open(path)?
            .take((COMMAND_LINE_SIZE - 1) as u64)
            .read_to_end(&mut buf)?;
        Ok(Self::from_bytes(buf))
    }

    /// Truncate `bytes` to the buffer bound (or the first NUL) and terminate.
    pub fn from_bytes(mut bytes: Vec<u8>) -> Self {
        bytes.truncate(COMMAND_LINE_SIZE - 1);
        if let Some(nul) = bytes.iter().position(|&b| b == 0) {
            bytes.truncate(nul);
        }
        bytes.push(0);
        Self { bytes }
    }

    /// Content without the terminating NUL.
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes
            .split_last()
            .map(|(_, content)| content)
            .unwrap_or_default()
    }

    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.bytes
    }
}

/// A kernel image found at the update path, with the command line to boot
/// it with.
#[derive(Debug)]
pub struct UpdateCandidate {
    pub path: PathBuf,
    pub image: File,
    pub cmdline: CommandLine,
}

/// How an update check ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// No candidate image. The normal case.
    Absent,
    /// The command line or the candidate could not be read.
    Skipped,
    /// A candidate exists but this kernel cannot kexec it.
    Unsupported,
    /// The kernel refused to stage the candidate.
    Rejected,
    /// The candidate was staged and the reboot sequence issued.
    Staged,
}

/// Look for a new kernel and reboot into it if possible.
pub fn check_update<K: Kernel>(kernel: &K, config: &Config) -> UpdateStatus {
    let cmdline = match CommandLine::read(&config.cmdline) {
        Ok(cmdline) => cmdline,
        Err(e) => {
            log_error!("read({}): {e}", config.cmdline.display());
            return UpdateStatus::Skipped;
        }
    };

    let image = match File::open(&config.kernel_image) {
        Ok(image) => image,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return UpdateStatus::Absent,
        Err(e) => {
            log_error!("open({}): {e}", config.kernel_image.display());
            return UpdateStatus::Skipped;
        }
    };

    let candidate = UpdateCandidate {
        path: config.kernel_image.clone(),
        image,
        cmdline,
    };
    stage(kernel, &candidate)
}

fn stage<K: Kernel>(kernel: &K, candidate: &UpdateCandidate) -> UpdateStatus {
    log_info!("Found {}, loading...", candidate.path.display());

    match kernel.kexec_file_load(&candidate.image, &candidate.cmdline) {
        Ok(()) => {}
        Err(KexecError::Unsupported) => {
            log_warn!(
                "Found {} but kexec is not supported, leaving it in place",
                candidate.path.display()
            );
            return UpdateStatus::Unsupported;
        }
        Err(e) => {
            log_error!("{e}");
            return UpdateStatus::Rejected;
        }
    }

    power::reboot(kernel, RebootMode::Kexec);
    UpdateStatus::Staged
}
