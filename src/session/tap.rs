//! Output fan-out for interactive sessions.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::session::ApprovalDetector;

/// One or more sinks failed during a fan-out write.
#[derive(thiserror::Error, Debug)]
#[error("{failed} output sink(s) failed: {source}")]
pub struct SinkError {
    /// Number of sinks that failed.
    pub failed: usize,
    /// First failure observed.
    pub source: io::Error,
}

/// Copies session output to every sink and then to the approval detector.
pub struct OutputTap {
    sinks: Vec<Box<dyn Write + Send>>,
    approver: ApprovalDetector,
}

impl std::fmt::Debug for OutputTap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputTap")
            .field("sinks", &self.sinks.len())
            .field("approver", &self.approver)
            .finish()
    }
}

impl OutputTap {
    #[must_use]
    pub fn new(sinks: Vec<Box<dyn Write + Send>>, approver: ApprovalDetector) -> Self {
        Self { sinks, approver }
    }

    #[must_use]
    pub fn approver(&self) -> &ApprovalDetector {
        &self.approver
    }

    /// Write `chunk` to each sink in registration order, flushing each.
    ///
    /// A failing sink does not stop delivery to the others; the first
    /// failure is returned once every sink has been tried. The detector is
    /// fed regardless.
    ///
    /// # Errors
    ///
    /// Returns `SinkError` if any sink failed to write or flush.
    pub fn write(&mut self, chunk: &[u8]) -> Result<(), SinkError> {
        if chunk.is_empty() {
            return Ok(());
        }

        let mut failed = 0;
        let mut first = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.write_all(chunk).and_then(|()| sink.flush()) {
                failed += 1;
                first.get_or_insert(e);
            }
        }

        self.approver.feed(&String::from_utf8_lossy(chunk));

        match first {
            Some(source) => Err(SinkError { failed, source }),
            None => Ok(()),
        }
    }

    /// Flush every sink, ignoring failures.
    pub fn flush(&mut self) {
        for sink in &mut self.sinks {
            let _ = sink.flush();
        }
    }
}

/// Open a transcript for appending and write the session header.
///
/// # Errors
///
/// Returns an error if the file or its parent directories cannot be created.
pub fn open_transcript(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    writeln!(file, "\n# Codex tool session {timestamp}")?;
    file.flush()?;
    Ok(file)
}
