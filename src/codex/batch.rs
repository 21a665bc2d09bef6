//! One-shot Codex invocations.
//!
//! Each call spawns Codex once with the prompt as the trailing argument,
//! captures all of its output and reduces it to an [`InvocationResult`].
//! Child-process failures never surface as `Err`; they become results with
//! `ok == false`.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Serialize;
use tokio::process::Command;

use crate::codex::{parse_output, EventRecord, LaunchEnv, SpawnError};
use crate::config::HarnessConfig;

/// Reply given when the Codex executable cannot be found.
pub const NOT_INSTALLED_MESSAGE: &str = "Codex CLI not installed; install @openai/codex";

/// Errors from prompt preparation. Process failures are reported in
/// [`InvocationResult`] instead.
#[derive(thiserror::Error, Debug)]
pub enum BatchError {
    #[error("Context file not found: {0}")]
    ContextMissing(PathBuf),
    #[error("Failed to read context file {path}: {source}")]
    ContextRead {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Outcome of a single batch invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationResult {
    /// False iff the process could not be launched or exited non-zero.
    pub ok: bool,
    /// Decoded events in output order.
    #[serde(rename = "raw")]
    pub events: Vec<EventRecord>,
    /// Final answer. Never empty.
    pub reply: String,
    pub stdout: String,
    pub stderr: String,
    /// Failure description, or the last error event of a successful run.
    /// Omitted from JSON when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InvocationResult {
    /// Build a failed result carrying `message` as both reply and error.
    #[must_use]
    pub fn stub(message: impl Into<String>, stdout: String, stderr: String) -> Self {
        let message = message.into();
        tracing::info!(message = %message, "Returning stub response");
        Self {
            ok: false,
            events: Vec::new(),
            reply: message.clone(),
            stdout,
            stderr,
            error: Some(message),
        }
    }

    /// Serialise with an OpenAI-style `choices` array alongside the fields.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(map) = value.as_object_mut() {
            map.insert(
                "choices".to_string(),
                serde_json::json!([{
                    "message": { "role": "assistant", "content": self.reply }
                }]),
            );
        }
        value
    }
}

/// Spawns Codex once per request.
#[derive(Debug, Clone)]
pub struct BatchInvoker {
    base_args: Vec<String>,
    home: PathBuf,
    context_path: PathBuf,
}

impl BatchInvoker {
    /// Create an invoker from a complete argument vector (executable first,
    /// prompt excluded) and a workspace home.
    #[must_use]
    pub fn new(base_args: Vec<String>, home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            context_path: home.join("context.md"),
            base_args,
            home,
        }
    }

    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.codex.batch_args(), &config.home)
    }

    /// Override the context file used by [`BatchInvoker::chat`].
    #[must_use]
    pub fn with_context_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.context_path = path.into();
        self
    }

    #[must_use]
    pub fn base_args(&self) -> &[String] {
        &self.base_args
    }

    #[must_use]
    pub fn context_path(&self) -> &Path {
        &self.context_path
    }

    /// Run Codex with `prompt` and classify the outcome.
    pub async fn invoke(&self, prompt: &str) -> InvocationResult {
        let Some((program, flags)) = self.base_args.split_first() else {
            return InvocationResult::stub(NOT_INSTALLED_MESSAGE, String::new(), String::new());
        };

        tracing::debug!(command = %render_command(&self.base_args, prompt), "Running Codex command");

        let mut cmd = Command::new(program);
        cmd.args(flags)
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match LaunchEnv::prepare(&self.home) {
            Ok(env) => env.apply(&mut cmd),
            Err(e) => tracing::warn!(error = %e, "Failed to prepare launch environment"),
        }

        let output = match cmd.output().await {
            Ok(output) => output,
            Err(e) => {
                return match SpawnError::from_io(e, program) {
                    SpawnError::NotFound(_) => {
                        tracing::error!(program = %program, "Codex CLI not found");
                        InvocationResult::stub(NOT_INSTALLED_MESSAGE, String::new(), program.clone())
                    }
                    other => {
                        tracing::error!(error = %other, "Failed to launch Codex CLI");
                        InvocationResult::stub(
                            format!("Failed to launch Codex CLI: {other}"),
                            String::new(),
                            other.to_string(),
                        )
                    }
                };
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let message = match output.status.code() {
                Some(code) => {
                    tracing::error!(code, stderr = %stderr.trim(), "Codex CLI exited with failure");
                    format!("Codex CLI failed with exit code {code}; check stderr")
                }
                None => {
                    tracing::error!(stderr = %stderr.trim(), "Codex CLI terminated by signal");
                    "Codex CLI terminated by signal; check stderr".to_string()
                }
            };
            return InvocationResult::stub(message, stdout, stderr);
        }

        let parsed = parse_output(&stdout);
        InvocationResult {
            ok: true,
            events: parsed.events,
            reply: parsed.reply,
            stdout,
            stderr,
            error: parsed.error,
        }
    }

    /// Send a chat prompt prefixed with the active project and context file.
    ///
    /// # Errors
    ///
    /// Returns `BatchError` if the context file is missing or unreadable.
    pub async fn chat(
        &self,
        prompt: &str,
        project: Option<&str>,
    ) -> Result<InvocationResult, BatchError> {
        let system = self.system_prompt(project).await?;
        tracing::debug!("Executing chat prompt via Codex CLI");
        Ok(self.invoke(&format!("{system}\n\nUser: {prompt}")).await)
    }

    /// Ask Codex to run a named tool with JSON parameters.
    pub async fn run_tool(&self, name: &str, params: &serde_json::Value) -> InvocationResult {
        tracing::debug!(tool = %name, "Executing tool");
        self.invoke(&tool_prompt(name, &params.to_string())).await
    }

    async fn system_prompt(&self, project: Option<&str>) -> Result<String, BatchError> {
        let path = &self.context_path;
        let context = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                tracing::error!(path = %path.display(), "Context file missing");
                BatchError::ContextMissing(path.clone())
            } else {
                BatchError::ContextRead {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;
        let header = match project {
            Some(slug) => format!("Active project: {slug}"),
            None => "Active project: none".to_string(),
        };
        Ok(format!("{header}\n\n{context}"))
    }
}

/// Natural-language instruction asking Codex to run a tool.
#[must_use]
pub fn tool_prompt(name: &str, params_json: &str) -> String {
    format!("Run tool {name} with parameters: {params_json}")
}

fn render_command(args: &[String], prompt: &str) -> String {
    args.iter()
        .map(String::as_str)
        .chain(std::iter::once(prompt))
        .map(|arg| shell_escape::escape(Cow::Borrowed(arg)).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
