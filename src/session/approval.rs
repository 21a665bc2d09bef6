//! Auto-approval of the workspace-write sandbox prompt.
//!
//! Codex asks for confirmation before it writes to the workspace. The
//! detector watches a rolling window of recent output and answers `y` the
//! first time a sandbox marker and a yes/no token appear together. Matching
//! is plain substring search over arbitrary chunk boundaries, so a prompt is
//! only caught when both parts land inside the same trailing window.

use std::io::Write;

use tokio::sync::mpsc::WeakUnboundedSender;

/// Terms that identify the sandbox approval prompt.
pub const APPROVAL_MARKERS: [&str; 3] = ["workspace", "sandbox", "write"];

/// Yes/no tokens of the confirmation prompt.
pub const APPROVAL_TOKENS: [&str; 3] = ["y/n", "[y/n", "[y/n]"];

/// Maximum number of characters kept in the rolling window.
pub const APPROVAL_WINDOW: usize = 1024;

/// Line sent to the child to confirm.
pub const CONFIRMATION_LINE: &str = "y";

/// Note written to the side channel after confirming.
pub const APPROVAL_NOTE: &str = "[codex-helper] Auto-approved workspace-write sandbox.\n";

/// Detector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalState {
    /// Watching output.
    Idle,
    /// Confirmation sent. Terminal.
    Sent,
    /// Auto-approval turned off. Terminal.
    Disabled,
}

/// Rolling-window approval detector. One instance per session.
pub struct ApprovalDetector {
    state: ApprovalState,
    buffer: String,
    input: Option<WeakUnboundedSender<Vec<u8>>>,
    notes: Option<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ApprovalDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalDetector")
            .field("state", &self.state)
            .field("buffered", &self.buffer.chars().count())
            .finish_non_exhaustive()
    }
}

impl ApprovalDetector {
    /// Create an active detector that answers through `input`.
    #[must_use]
    pub fn new(input: WeakUnboundedSender<Vec<u8>>, notes: Option<Box<dyn Write + Send>>) -> Self {
        Self {
            state: ApprovalState::Idle,
            buffer: String::new(),
            input: Some(input),
            notes,
        }
    }

    /// Create a detector that never responds.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            state: ApprovalState::Disabled,
            buffer: String::new(),
            input: None,
            notes: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> ApprovalState {
        self.state
    }

    /// Current window contents (lower-cased).
    #[must_use]
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Feed a chunk of output. Returns true if this chunk triggered the
    /// confirmation.
    pub fn feed(&mut self, chunk: &str) -> bool {
        if self.state != ApprovalState::Idle || chunk.is_empty() {
            return false;
        }

        self.buffer.push_str(&chunk.to_lowercase());
        let triggered = APPROVAL_MARKERS.iter().any(|m| self.buffer.contains(m))
            && APPROVAL_TOKENS.iter().any(|t| self.buffer.contains(t));

        if triggered {
            self.confirm();
        }
        trim_to_tail(&mut self.buffer, APPROVAL_WINDOW);
        triggered
    }

    fn confirm(&mut self) {
        self.state = ApprovalState::Sent;
        tracing::info!("Approval prompt detected; sending confirmation");

        let line = format!("{CONFIRMATION_LINE}\n").into_bytes();
        let delivered = self
            .input
            .as_ref()
            .and_then(WeakUnboundedSender::upgrade)
            .is_some_and(|tx| tx.send(line).is_ok());
        if !delivered {
            tracing::warn!("Child input closed; confirmation not delivered");
        }

        if let Some(notes) = self.notes.as_mut() {
            if let Err(e) = notes
                .write_all(APPROVAL_NOTE.as_bytes())
                .and_then(|()| notes.flush())
            {
                tracing::debug!(error = %e, "Failed to write approval note");
            }
        }
    }
}

/// Drop leading characters so at most `max_chars` remain.
pub(crate) fn trim_to_tail(text: &mut String, max_chars: usize) {
    let count = text.chars().count();
    if count <= max_chars {
        return;
    }
    let cut = text
        .char_indices()
        .nth(count - max_chars)
        .map_or(text.len(), |(idx, _)| idx);
    text.drain(..cut);
}
