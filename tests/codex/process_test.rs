//! Tests for executable resolution and process control.

use std::ffi::OsString;
use std::time::Duration;

use codex_harness::codex::{graceful_terminate, resolve_executable_in, wait_for_exit, SpawnError};
#[cfg(unix)]
use portable_pty::{native_pty_system, CommandBuilder, PtySize};

#[cfg(unix)]
#[test]
fn resolution_searches_each_path_entry() {
    use std::os::unix::fs::PermissionsExt;

    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let exe = second.path().join("codex");
    std::fs::write(&exe, "#!/bin/sh\n").unwrap();
    std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

    let path_var = std::env::join_paths([first.path(), second.path()]).unwrap();
    assert_eq!(resolve_executable_in("codex", Some(&path_var)), Some(exe));
}

#[cfg(unix)]
#[test]
fn non_executable_files_are_not_resolved() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("codex"), "data").unwrap();

    let path_var = OsString::from(dir.path());
    assert!(resolve_executable_in("codex", Some(&path_var)).is_none());
}

#[test]
fn spawn_error_names_program() {
    let err = SpawnError::from_io(std::io::ErrorKind::NotFound.into(), "codex");
    assert!(err.to_string().contains("codex"));
}

#[cfg(unix)]
#[tokio::test]
async fn graceful_terminate_stops_sleeping_child() {
    let pair = native_pty_system().openpty(PtySize::default()).unwrap();
    let mut cmd = CommandBuilder::new("sleep");
    cmd.arg("30");
    let mut child = pair.slave.spawn_command(cmd).unwrap();
    drop(pair.slave);

    let status = graceful_terminate(&mut *child, Duration::from_secs(2))
        .await
        .unwrap();
    assert!(!status.success());
}

#[cfg(unix)]
#[tokio::test]
async fn wait_for_exit_reports_running_child() {
    let pair = native_pty_system().openpty(PtySize::default()).unwrap();
    let mut cmd = CommandBuilder::new("sleep");
    cmd.arg("30");
    let mut child = pair.slave.spawn_command(cmd).unwrap();

    let status = wait_for_exit(&mut *child, Duration::from_millis(100))
        .await
        .unwrap();
    assert!(status.is_none());
    child.kill().unwrap();
}
