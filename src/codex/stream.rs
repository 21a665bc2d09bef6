//! Answer extraction from Codex stdout.

use crate::codex::{EventPayload, EventRecord};

/// Reply used when the output carries nothing usable.
pub const NO_REPLY_PLACEHOLDER: &str = "Codex CLI returned no assistant message.";

/// Running state of the answer fold.
///
/// Reply and error candidates are tracked independently; in both, the last
/// event seen wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyFold {
    /// Latest assistant reply.
    pub reply: Option<String>,
    /// Latest error text.
    pub error: Option<String>,
}

impl ReplyFold {
    /// Fold one event into the state.
    #[must_use]
    pub fn step(self, event: &EventRecord) -> Self {
        match event.payload() {
            Some(EventPayload::Reply(text)) => Self {
                reply: Some(text),
                ..self
            },
            Some(EventPayload::Error(text)) => Self {
                error: Some(text),
                ..self
            },
            None => self,
        }
    }

    /// Resolve the final reply: reply, then error, then trimmed stdout,
    /// then [`NO_REPLY_PLACEHOLDER`]. Empty candidates are skipped.
    #[must_use]
    pub fn resolve(&self, stdout: &str) -> String {
        [
            self.reply.as_deref(),
            self.error.as_deref(),
            Some(stdout.trim()),
        ]
        .into_iter()
        .flatten()
        .find(|candidate| !candidate.is_empty())
        .unwrap_or(NO_REPLY_PLACEHOLDER)
        .to_string()
    }
}

/// Result of parsing one batch invocation's stdout.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOutput {
    /// Every line that decoded as JSON, in order.
    pub events: Vec<EventRecord>,
    /// The final answer. Never empty.
    pub reply: String,
    /// Last error text, if any error event carried one.
    pub error: Option<String>,
}

/// Decode one line, skipping blank and non-JSON lines.
#[must_use]
pub fn parse_line(line: &str) -> Option<EventRecord> {
    let candidate = line.trim();
    if candidate.is_empty() {
        return None;
    }
    match EventRecord::parse(candidate) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(line = %candidate, error = %e, "Skipping non-JSON line from Codex");
            None
        }
    }
}

/// Parse the complete stdout of a batch invocation.
#[must_use]
pub fn parse_output(stdout: &str) -> ParsedOutput {
    let events: Vec<EventRecord> = stdout.lines().filter_map(parse_line).collect();
    let fold = events.iter().fold(ReplyFold::default(), ReplyFold::step);

    if fold.reply.as_deref().map_or(true, str::is_empty) {
        tracing::debug!("No assistant message found; falling back");
    }

    ParsedOutput {
        reply: fold.resolve(stdout),
        error: fold.error.filter(|text| !text.is_empty()),
        events,
    }
}
