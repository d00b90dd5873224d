//! Filesystem initialization.
//!
//! Mounts the pseudo filesystems every userspace tool expects, creates the
//! shared scratch directories, and adds the classic compatibility symlinks.
//! Nothing is logged while this runs: descriptor 2 is not bound yet. Every
//! failure is collected into an [`FsReport`] that the caller logs once the
//! console is wired, and one bad mount never stops the ones after it.

use nix::errno::Errno;
use nix::mount::MsFlags;
use std::fs::{self, DirBuilder, Permissions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt, symlink};
use std::path::{Path, PathBuf};

use crate::kernel::Kernel;
use crate::{log_crit, log_warn};

/// One row of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    pub source: Option<&'static str>,
    pub target: &'static str,
    pub fstype: Option<&'static str>,
    pub flags: MsFlags,
    pub data: Option<&'static str>,
}

/// Result of applying one [`MountSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountOutcome {
    pub target: &'static str,
    pub result: Result<(), Errno>,
}

/// A scratch directory or symlink that could not be created.
#[derive(Debug)]
pub struct LayoutFailure {
    pub op: &'static str,
    pub path: &'static str,
    pub error: io::Error,
}

/// Everything [`init_fs`] attempted, for deferred logging.
#[derive(Debug, Default)]
pub struct FsReport {
    /// One entry per mount table row, in table order.
    pub mounts: Vec<MountOutcome>,
    pub layout: Vec<LayoutFailure>,
}

impl FsReport {
    pub fn failed_mounts(&self) -> usize {
        self.mounts.iter().filter(|m| m.result.is_err()).count()
    }

    /// Log every failure, mounts first.
    pub fn log(&self) {
        for outcome in &self.mounts {
            if let Err(e) = outcome.result {
                log_crit!("mount({}): {e}", outcome.target);
            }
        }
        for failure in &self.layout {
            log_warn!("{}({}): {}", failure.op, failure.path, failure.error);
        }
    }
}

const STICKY_DIRS: [&str; 2] = ["/dev/shm", "/tmp"];

const SYMLINKS: [(&str, &str); 5] = [
    ("/proc/mounts", "/etc/mtab"),
    ("/proc/self/fd", "/dev/fd"),
    ("/proc/self/fd/0", "/dev/stdin"),
    ("/proc/self/fd/1", "/dev/stdout"),
    ("/proc/self/fd/2", "/dev/stderr"),
];

/// The mount table, in application order.
///
/// Each target's parent must already exist (or be created by an earlier
/// row) when its row is applied.
pub fn mount_table() -> Vec<MountSpec> {
    let nose = MsFlags::MS_NOSUID | MsFlags::MS_NOEXEC;

    vec![
        MountSpec {
            source: None,
            target: "/",
            fstype: None,
            flags: MsFlags::MS_REMOUNT | MsFlags::MS_NOSUID,
            data: None,
        },
        MountSpec {
            source: Some("none"),
            target: "/proc",
            fstype: Some("proc"),
            flags: nose | MsFlags::MS_NODEV,
            data: None,
        },
        MountSpec {
            source: Some("none"),
            target: "/sys",
            fstype: Some("sysfs"),
            flags: nose | MsFlags::MS_NODEV,
            data: None,
        },
        MountSpec {
            source: Some("none"),
            target: "/sys/fs/cgroup",
            fstype: Some("cgroup2"),
            flags: nose | MsFlags::MS_NODEV,
            data: None,
        },
        MountSpec {
            source: Some("none"),
            target: "/dev",
            fstype: Some("devtmpfs"),
            flags: nose | MsFlags::MS_STRICTATIME,
            data: None,
        },
        MountSpec {
            source: Some("devpts"),
            target: "/dev/pts",
            fstype: Some("devpts"),
            flags: nose,
            data: Some("gid=5,mode=0620"),
        },
    ]
}

/// Resolve an absolute layout path below `root`.
fn rooted(root: &Path, path: &str) -> PathBuf {
    root.join(path.trim_start_matches('/'))
}

/// Initialize the filesystem layout below `root` (`/` in production).
///
/// Logs nothing; see [`FsReport::log`].
pub fn init_fs<K: Kernel>(kernel: &K, root: &Path) -> FsReport {
    let mut report = FsReport {
        mounts: mount_table()
            .iter()
            .map(|spec| MountOutcome {
                target: spec.target,
                result: apply_mount(kernel, root, spec),
            })
            .collect(),
        layout: Vec::new(),
    };

    for dir in STICKY_DIRS {
        if let Err(error) = create_sticky_dir(&rooted(root, dir)) {
            report.layout.push(LayoutFailure {
                op: "mkdir",
                path: dir,
                error,
            });
        }
    }

    for (target, link) in SYMLINKS {
        match symlink(target, rooted(root, link)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(error) => report.layout.push(LayoutFailure {
                op: "symlink",
                path: link,
                error,
            }),
        }
    }

    report
}

fn apply_mount<K: Kernel>(kernel: &K, root: &Path, spec: &MountSpec) -> Result<(), Errno> {
    let target = rooted(root, spec.target);
    // A missing parent shows up as a mount error below.
    let _ = DirBuilder::new().mode(0o755).create(&target);
    kernel.mount(spec, &target)
}

/// Create a world-writable sticky directory regardless of the umask.
fn create_sticky_dir(path: &Path) -> io::Result<()> {
    match DirBuilder::new().mode(0o1777).create(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
        Err(e) => return Err(e),
    }
    fs::set_permissions(path, Permissions::from_mode(0o1777))
}

/// Unlink the on-disk image of the running program.
pub fn remove_self_image() {
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            log_warn!("readlink(/proc/self/exe): {e}");
            return;
        }
    };

    if let Err(e) = remove_image(&exe) {
        log_warn!("unlink({}): {e}", exe.display());
    }
}

/// Remove `path`, treating an already missing file as success.
pub fn remove_image(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
