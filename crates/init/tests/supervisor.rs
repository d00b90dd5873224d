mod common;

use std::fs;
use std::process::Command;

use common::{WAIT_MUTEX, write_script};
use init::supervisor::{Outcome, SpawnRequest, SuperviseError, supervise};
use nix::sys::signal::{SigSet, Signal};

fn sh(script: &str) -> SpawnRequest {
    SpawnRequest::new("/bin/sh", SigSet::empty())
        .arg("-c")
        .arg(script)
}

#[test]
fn reports_exit_status() {
    let _guard = WAIT_MUTEX.lock().unwrap();

    let outcome = supervise(sh("exit 3")).unwrap();
    assert_eq!(outcome, Outcome::Exited(3));
}

#[test]
fn reports_terminating_signal() {
    let _guard = WAIT_MUTEX.lock().unwrap();

    let outcome = supervise(sh("kill -TERM $$")).unwrap();
    assert_eq!(outcome, Outcome::Signaled(Signal::SIGTERM));
}

#[test]
fn missing_program_is_a_spawn_failure() {
    let _guard = WAIT_MUTEX.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let err = supervise(SpawnRequest::new(dir.path().join("boot"), SigSet::empty())).unwrap_err();
    assert!(matches!(err, SuperviseError::Spawn { .. }), "got {err:?}");
}

#[test]
fn waits_for_target_and_discards_unrelated_children() {
    let _guard = WAIT_MUTEX.lock().unwrap();

    let mut unrelated = Command::new("/bin/true").spawn().unwrap();
    let outcome = supervise(sh("sleep 0.3; exit 7")).unwrap();

    assert_eq!(outcome, Outcome::Exited(7));
    // The wildcard wait already reaped it.
    assert!(unrelated.try_wait().is_err());
}

#[test]
fn does_not_return_before_target_terminates() {
    let _guard = WAIT_MUTEX.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let done = dir.path().join("done");

    let outcome = supervise(sh(&format!("sleep 0.2; touch {}", done.display()))).unwrap();

    assert_eq!(outcome, Outcome::Exited(0));
    assert!(done.exists());
}

#[test]
fn child_gets_requested_signal_mask() {
    let _guard = WAIT_MUTEX.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("status");

    let mut mask = SigSet::empty();
    mask.add(Signal::SIGUSR1);
    let request = SpawnRequest::new("/bin/sh", mask)
        .arg("-c")
        .arg(format!("exec grep SigBlk /proc/self/status > {}", out.display()));
    assert_eq!(supervise(request).unwrap(), Outcome::Exited(0));

    // SIGUSR1 is signal 10, bit 9.
    let status = fs::read_to_string(&out).unwrap();
    assert!(status.contains("0000000000000200"), "status: {status}");
}

#[test]
fn child_runs_in_its_own_session() {
    let _guard = WAIT_MUTEX.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("stat");
    let program = dir.path().join("session");
    write_script(&program, &format!("exec cat /proc/self/stat > {}", out.display()));

    assert_eq!(
        supervise(SpawnRequest::new(&program, SigSet::empty())).unwrap(),
        Outcome::Exited(0)
    );

    // pid (comm) state ppid pgrp session ...
    let stat = fs::read_to_string(&out).unwrap();
    let pid: i32 = stat.split_whitespace().next().unwrap().parse().unwrap();
    let rest: Vec<&str> = stat.rsplit_once(')').unwrap().1.split_whitespace().collect();
    let session: i32 = rest[3].parse().unwrap();
    assert_eq!(session, pid);
}
