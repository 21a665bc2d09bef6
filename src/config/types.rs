//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Approval values that map to the bypass flag instead of `--ask-for-approval`.
const BYPASS_APPROVALS: [&str; 2] = [
    "dangerously-bypass",
    "dangerously-bypass-approvals-and-sandbox",
];

/// Flag emitted for the bypass approval policy.
pub const BYPASS_FLAG: &str = "--dangerously-bypass-approvals-and-sandbox";

/// Settings for launching the Codex CLI in batch mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodexConfig {
    /// Executable name or path.
    pub bin: String,
    /// Approval policy (`on-request`, `never`, `dangerously-bypass`, ...).
    pub approval: Option<String>,
    /// Sandbox policy.
    pub sandbox: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// Codex profile.
    pub profile: Option<String>,
}

impl Default for CodexConfig {
    fn default() -> Self {
        Self {
            bin: "codex".to_string(),
            approval: None,
            sandbox: Some("workspace-write".to_string()),
            model: Some("gpt-5-codex".to_string()),
            profile: None,
        }
    }
}

impl CodexConfig {
    /// Build the argument vector for a batch launch, without the prompt.
    ///
    /// The first element is the executable.
    #[must_use]
    pub fn batch_args(&self) -> Vec<String> {
        let mut args = vec![self.bin.clone()];

        let approval = non_blank(self.approval.as_deref());
        let sandbox = non_blank(self.sandbox.as_deref());

        match approval {
            Some(policy)
                if BYPASS_APPROVALS
                    .iter()
                    .any(|bypass| policy.eq_ignore_ascii_case(bypass)) =>
            {
                args.push(BYPASS_FLAG.to_string());
            }
            Some(policy) => {
                args.push("--ask-for-approval".to_string());
                args.push(policy.to_string());
            }
            None => {}
        }

        if let Some(sandbox) = sandbox {
            args.push("--sandbox".to_string());
            args.push(sandbox.to_string());
        }

        if let Some(profile) = non_blank(self.profile.as_deref()) {
            args.push("--profile".to_string());
            args.push(profile.to_string());
        }

        if let Some(model) = non_blank(self.model.as_deref()) {
            args.push("--model".to_string());
            args.push(model.to_string());
        }

        args.push("exec".to_string());
        args.push("--json".to_string());
        args
    }
}

/// Settings for interactive sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Executable name or path.
    pub bin: String,
    /// Sandbox mode requested from Codex.
    pub sandbox: String,
    /// Send `y` automatically on the workspace-write approval prompt.
    pub auto_approve: bool,
    /// Seconds to wait for the ready prompt after each command.
    pub prompt_timeout_secs: u64,
    /// Seconds to wait for a clean exit before killing the process.
    pub exit_grace_secs: u64,
    /// Optional transcript file.
    pub transcript: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bin: "codex".to_string(),
            sandbox: "workspace-write".to_string(),
            auto_approve: true,
            prompt_timeout_secs: 60,
            exit_grace_secs: 5,
            transcript: None,
        }
    }
}

impl SessionConfig {
    /// Arguments passed to the executable for an interactive session.
    #[must_use]
    pub fn interactive_args(&self) -> Vec<String> {
        vec![
            "exec".to_string(),
            "--sandbox".to_string(),
            self.sandbox.clone(),
            "--json".to_string(),
        ]
    }

    #[must_use]
    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.prompt_timeout_secs)
    }

    #[must_use]
    pub fn exit_grace(&self) -> Duration {
        Duration::from_secs(self.exit_grace_secs)
    }
}

/// Settings for the HTTP-backed tool API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL requests are resolved against.
    pub base_url: String,
    /// Bearer token. Absent or placeholder values switch to stub replies.
    pub api_key: Option<String>,
    /// Attempts per request.
    pub max_retries: u32,
    /// Per-attempt timeout.
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key: None,
            max_retries: 3,
            timeout_seconds: 60,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Workspace home holding `bin/`, `tmp/` and `context.md`.
    #[serde(default = "default_home")]
    pub home: PathBuf,
    #[serde(default)]
    pub codex: CodexConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

fn default_home() -> PathBuf {
    PathBuf::from(".")
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            home: default_home(),
            codex: CodexConfig::default(),
            session: SessionConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Path of the context file used to build chat prompts.
    #[must_use]
    pub fn context_path(&self) -> PathBuf {
        self.home.join("context.md")
    }

    /// Apply environment overrides using the given lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(home) = lookup("PAI_HOME") {
            self.home = PathBuf::from(home);
        }
        if let Some(bin) = lookup("CODEX_BIN") {
            self.codex.bin.clone_from(&bin);
            self.session.bin = bin;
        }
        if let Some(approval) = lookup("PAI_APPROVAL") {
            self.codex.approval = Some(approval);
        }
        if let Some(sandbox) = lookup("PAI_SANDBOX") {
            self.codex.sandbox = Some(sandbox);
        }
        if let Some(model) = lookup("PAI_MODEL") {
            self.codex.model = Some(model);
        }
        if let Some(profile) = lookup("PAI_PROFILE") {
            self.codex.profile = Some(profile);
        }
        if let Some(sandbox) = lookup("CODEX_SANDBOX") {
            self.session.sandbox = sandbox;
        }
        if let Some(key) = lookup("PAI_API_KEY") {
            self.api.api_key = Some(key);
        }
        if let Some(url) = lookup("PAI_API_BASE_URL") {
            self.api.base_url = url;
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
