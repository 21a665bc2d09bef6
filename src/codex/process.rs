//! Codex process launch helpers.
//!
//! Shared by the batch invoker and the interactive session driver: error
//! classification for failed spawns, environment preparation and executable
//! lookup. The session driver also uses the exit helpers for its
//! terminal-attached child.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use portable_pty::{Child as PtyChild, ExitStatus};
use tokio::process::Command;
use tokio::time::Instant;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("Codex binary not found: {0}")]
    NotFound(String),
    /// Permission denied when spawning.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    #[must_use]
    pub fn from_io(err: io::Error, program: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(program.to_string()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(program.to_string()),
            _ => Self::Io(err),
        }
    }
}

/// Environment overrides applied to every Codex launch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchEnv {
    vars: Vec<(String, String)>,
}

impl LaunchEnv {
    /// Prepare overrides from the current process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the fallback temp directory cannot be created.
    pub fn prepare(home: &Path) -> io::Result<Self> {
        Self::prepare_with(home, |key| std::env::var(key).ok())
    }

    /// Prepare overrides using `lookup` to read existing variables.
    ///
    /// `home/bin` is prepended to `PATH` when it exists. When neither
    /// `PAI_TMPDIR` nor `TMPDIR` is set, `home/tmp` is created and used as
    /// `TMPDIR`.
    ///
    /// # Errors
    ///
    /// Returns an error if the fallback temp directory cannot be created.
    pub fn prepare_with<F>(home: &Path, lookup: F) -> io::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut vars = Vec::new();

        let bin_dir = home.join("bin");
        if bin_dir.is_dir() {
            let current = lookup("PATH").unwrap_or_default();
            let sep = if cfg!(windows) { ';' } else { ':' };
            vars.push((
                "PATH".to_string(),
                format!("{}{sep}{current}", bin_dir.display()),
            ));
        }

        let tmp_override = lookup("PAI_TMPDIR")
            .or_else(|| lookup("TMPDIR"))
            .filter(|v| !v.is_empty());
        if tmp_override.is_none() {
            let tmp_dir = home.join("tmp");
            std::fs::create_dir_all(&tmp_dir)?;
            vars.push(("TMPDIR".to_string(), tmp_dir.display().to_string()));
        }

        Ok(Self { vars })
    }

    /// The overrides as key/value pairs.
    #[must_use]
    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    /// Apply the overrides to a command.
    pub fn apply(&self, cmd: &mut Command) {
        for (key, value) in &self.vars {
            cmd.env(key, value);
        }
    }
}

/// Resolve an executable the way a shell would.
///
/// A program containing a path separator must exist as given; a bare name
/// is searched in `PATH`.
#[must_use]
pub fn resolve_executable(program: &str) -> Option<PathBuf> {
    resolve_executable_in(program, std::env::var_os("PATH").as_deref())
}

/// Resolve an executable against an explicit search path.
#[must_use]
pub fn resolve_executable_in(program: &str, path_var: Option<&OsStr>) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    std::env::split_paths(path_var?)
        .map(|dir| dir.join(program))
        .find(|path| is_executable(path))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Interval between exit checks on a terminal-attached child.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Poll `child` until it exits or `timeout` elapses.
///
/// Returns `None` if the child is still running at the deadline.
///
/// # Errors
///
/// Returns an error if the exit status cannot be queried.
pub async fn wait_for_exit(
    child: &mut (dyn PtyChild + Send + Sync),
    timeout: Duration,
) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(EXIT_POLL_INTERVAL).await;
    }
}

/// Attempt graceful termination with a timeout.
///
/// On Unix, sends SIGTERM first, then kills the child after the timeout.
/// On other platforms, falls back to immediate kill.
///
/// # Errors
///
/// Returns an error if termination fails or the child outlives the kill.
pub async fn graceful_terminate(
    child: &mut (dyn PtyChild + Send + Sync),
    timeout: Duration,
) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.process_id() {
            let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
            let _ = kill(nix_pid, Signal::SIGTERM);
            if let Some(status) = wait_for_exit(child, timeout).await? {
                return Ok(status);
            }
        }
    }

    child.kill()?;
    wait_for_exit(child, timeout)
        .await?
        .ok_or_else(|| io::Error::other("Codex did not exit after kill"))
}
