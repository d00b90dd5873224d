mod common;

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use common::RecordingKernel;
use init::control;
use init::fd::{self, Binding};
use init::fs::mount_table;
use nix::errno::Errno;

/// These tests rebind descriptor 2 and count open descriptors, so nothing
/// else in this binary may open or close files while they run.
static FD_MUTEX: Mutex<()> = Mutex::new(());

fn open_fds() -> usize {
    fs::read_dir("/proc/self/fd").unwrap().count()
}

fn leak(path: &Path) -> &'static str {
    path.to_str().unwrap().to_owned().leak()
}

#[test]
fn mount_failures_reach_the_bound_log_sink() {
    let _guard = FD_MUTEX.lock().unwrap();
    let root = tempfile::tempdir().unwrap();
    let sink = tempfile::NamedTempFile::new().unwrap();
    let kernel = RecordingKernel::new().failing_mounts(Errno::EPERM);
    let bindings = [Binding {
        path: leak(sink.path()),
        target: 2,
    }];

    // Start the way the kernel starts us: nothing on descriptor 2.
    let saved = unsafe { libc::dup(2) };
    assert!(saved >= 0);
    unsafe { libc::close(2) };

    let report = control::init_system(&kernel, root.path(), &bindings);

    unsafe {
        libc::dup2(saved, 2);
        libc::close(saved);
    }

    assert_eq!(report.failed_mounts(), mount_table().len());
    let log = fs::read_to_string(sink.path()).unwrap();
    let mounts: Vec<_> = log
        .lines()
        .filter(|l| l.starts_with("<2>init: mount("))
        .collect();
    assert_eq!(mounts.len(), mount_table().len(), "{log}");
    assert!(mounts[1].starts_with("<2>init: mount(/proc): "), "{log}");
    // No etc/ in the scratch root, so the mtab link fails too.
    assert!(log.contains("<4>init: symlink(/etc/mtab): "), "{log}");
}

#[test]
fn binding_leaves_exactly_one_new_descriptor() {
    let _guard = FD_MUTEX.lock().unwrap();
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let target = 400;

    let before = open_fds();
    fd::bind_fd(tmp.path(), target).unwrap();
    assert_eq!(open_fds(), before + 1);

    // Rebinding replaces the target instead of stacking another descriptor.
    fd::bind_fd(tmp.path(), target).unwrap();
    assert_eq!(open_fds(), before + 1);

    unsafe { libc::close(target) };
    assert_eq!(open_fds(), before);
}

#[test]
fn failed_bindings_open_nothing() {
    let _guard = FD_MUTEX.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let bindings = [Binding {
        path: leak(&dir.path().join("missing")),
        target: 401,
    }];

    let before = open_fds();
    fd::bind_fds(&bindings);
    assert_eq!(open_fds(), before);
}
