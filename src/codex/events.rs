//! Event records from Codex `--json` output.
//!
//! Codex emits one JSON object per line shaped like
//! `{"msg": {"type": "...", "message": ...}}`. Only a handful of `type`
//! values matter for answer extraction; everything else is carried through
//! untouched in [`EventRecord::raw`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminator of an event's `msg.type` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Assistant output.
    AgentMessage,
    /// Fatal error reported by Codex.
    Error,
    /// Error raised while streaming from the model.
    StreamError,
    /// Any other `type` value.
    Other(String),
    /// No `msg` object or no string `type`.
    Missing,
}

impl EventKind {
    fn from_type(value: &str) -> Self {
        match value {
            "agent_message" => Self::AgentMessage,
            "error" => Self::Error,
            "stream_error" => Self::StreamError,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns true for `error` and `stream_error`.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error | Self::StreamError)
    }
}

/// What an event contributes to the final answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// Candidate assistant reply.
    Reply(String),
    /// Candidate error text.
    Error(String),
}

/// One decoded line of Codex output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventRecord(Value);

impl EventRecord {
    /// Decode a single line.
    ///
    /// # Errors
    ///
    /// Returns the decode error if the line is not JSON.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line).map(Self)
    }

    /// The undecoded JSON value.
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.0
    }

    fn msg(&self) -> Option<&serde_json::Map<String, Value>> {
        self.0.get("msg").and_then(Value::as_object)
    }

    /// The `msg.type` discriminator.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.msg()
            .and_then(|msg| msg.get("type"))
            .and_then(Value::as_str)
            .map_or(EventKind::Missing, EventKind::from_type)
    }

    /// The nested `msg.message` value.
    #[must_use]
    pub fn message(&self) -> Option<&Value> {
        self.msg().and_then(|msg| msg.get("message"))
    }

    /// Classify the event for answer extraction.
    ///
    /// An `agent_message` yields a reply when its payload is either a bare
    /// string or an object with `role == "assistant"` and string `content`.
    /// `error` and `stream_error` yield their string `message`.
    #[must_use]
    pub fn payload(&self) -> Option<EventPayload> {
        let kind = self.kind();
        let message = self.message()?;
        match kind {
            EventKind::AgentMessage => match message {
                Value::String(text) => Some(EventPayload::Reply(text.clone())),
                Value::Object(map) => {
                    let role = map.get("role").and_then(Value::as_str);
                    let content = map.get("content").and_then(Value::as_str);
                    match (role, content) {
                        (Some("assistant"), Some(content)) => {
                            Some(EventPayload::Reply(content.to_string()))
                        }
                        _ => None,
                    }
                }
                _ => None,
            },
            kind if kind.is_error() => message
                .as_str()
                .map(|text| EventPayload::Error(text.to_string())),
            _ => None,
        }
    }
}

impl From<Value> for EventRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
