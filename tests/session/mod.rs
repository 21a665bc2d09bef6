//! Interactive session tests.
//!
//! The fake Codex used here is a `/bin/sh` script that prints `codex> `,
//! echoes each line it reads, and understands a few test commands.

mod driver_test;
mod repl_test;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use codex_harness::config::SessionConfig;

/// Fake Codex REPL.
///
/// - `exit` prints `bye` and exits
/// - `approve` asks a workspace-write question and echoes the answer
/// - `slow` sleeps before printing the next prompt
/// - anything else is echoed as `got: <line>`
pub const FAKE_CODEX: &str = r#"#!/bin/sh
printf 'args: %s\n' "$*"
printf 'codex> '
while IFS= read -r line; do
  case "$line" in
    exit)
      echo bye
      exit 0
      ;;
    approve)
      printf 'Allow Codex to write to the workspace? [y/n] '
      IFS= read -r ans
      printf 'approved: %s\n' "$ans"
      ;;
    slow)
      sleep 2
      ;;
    *)
      printf 'got: %s\n' "$line"
      ;;
  esac
  printf 'codex> '
done
"#;

/// Write an executable script into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("codex");
    {
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file.sync_all().unwrap();
    }
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Session configuration pointing at `bin` with short timeouts.
pub fn test_config(bin: &Path) -> SessionConfig {
    SessionConfig {
        bin: bin.display().to_string(),
        prompt_timeout_secs: 5,
        exit_grace_secs: 2,
        ..SessionConfig::default()
    }
}

/// Clonable in-memory sink.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
