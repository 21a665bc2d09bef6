//! Tool dispatch for the API-backed backend.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::api::{ApiError, RetryingClient, Transport};

/// Tools the API backend knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Search,
    CreateImage,
    Analyze,
}

impl ToolKind {
    pub const ALL: [Self; 3] = [Self::Search, Self::CreateImage, Self::Analyze];

    /// Name used on the command line and in prompts.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::CreateImage => "create_image",
            Self::Analyze => "analyze",
        }
    }

    /// Endpoint path relative to the API base URL.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Search => "/search",
            Self::CreateImage => "/images",
            Self::Analyze => "/analyze",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ToolKind {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

/// Errors from tool dispatch.
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Tool parameters must be a JSON object")]
    InvalidParameters,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Runs tools through a [`RetryingClient`].
#[derive(Debug, Clone)]
pub struct ToolBackend<T> {
    client: RetryingClient<T>,
}

impl<T: Transport> ToolBackend<T> {
    #[must_use]
    pub fn new(client: RetryingClient<T>) -> Self {
        Self { client }
    }

    /// Run a tool by name.
    ///
    /// # Errors
    ///
    /// Returns `ToolError::UnknownTool` for names outside [`ToolKind::ALL`],
    /// otherwise any error from [`ToolBackend::run`].
    pub async fn run_named(&self, name: &str, params: &Value) -> Result<Value, ToolError> {
        self.run(name.parse()?, params).await
    }

    /// Run `kind` with `params`.
    ///
    /// # Errors
    ///
    /// Returns `ToolError::InvalidParameters` if `params` is not an object
    /// and `ToolError::Api` when the request fails after retries.
    pub async fn run(&self, kind: ToolKind, params: &Value) -> Result<Value, ToolError> {
        if !params.is_object() {
            return Err(ToolError::InvalidParameters);
        }
        tracing::debug!(tool = %kind, "Dispatching tool to API backend");
        let reply = match kind {
            ToolKind::Search => self.search(params).await?,
            ToolKind::CreateImage => self.create_image(params).await?,
            ToolKind::Analyze => self.analyze(params).await?,
        };
        Ok(tag_reply(kind, reply))
    }

    async fn search(&self, params: &Value) -> Result<Value, ApiError> {
        self.client.post(ToolKind::Search.path(), params).await
    }

    async fn create_image(&self, params: &Value) -> Result<Value, ApiError> {
        self.client.post(ToolKind::CreateImage.path(), params).await
    }

    async fn analyze(&self, params: &Value) -> Result<Value, ApiError> {
        self.client.post(ToolKind::Analyze.path(), params).await
    }
}

/// Add the tool name to object replies that lack one.
fn tag_reply(kind: ToolKind, mut reply: Value) -> Value {
    if let Some(map) = reply.as_object_mut() {
        map.entry("tool")
            .or_insert_with(|| Value::String(kind.name().to_string()));
    }
    reply
}
