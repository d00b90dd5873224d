use std::process::Command;

#[test]
fn exits_with_status_1_when_not_pid_1() {
    let dir = tempfile::tempdir().unwrap();
    let status = Command::new(env!("CARGO_BIN_EXE_init"))
        .arg("secret=1")
        .env("INIT_BOOT", dir.path().join("boot"))
        .current_dir(dir.path())
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(1));
    // Nothing was mounted or created.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
