//! Colored CLI display utilities for harness output.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::codex::InvocationResult;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Maximum length for truncated display strings.
const DEFAULT_MAX_LEN: usize = 80;

/// Truncate a string to a maximum number of characters, adding an ellipsis
/// if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let head: String = s.chars().take(max_len - 3).collect();
    format!("{head}...")
}

/// Format tool parameters for display, truncating long values.
#[must_use]
pub fn format_params(params: &serde_json::Value) -> String {
    match params {
        serde_json::Value::Object(map) => {
            let pairs: Vec<String> = map
                .iter()
                .map(|(k, v)| {
                    let value_str = match v {
                        serde_json::Value::String(s) => truncate(s, 50),
                        other => truncate(&other.to_string(), 50),
                    };
                    format!("{k}={value_str}")
                })
                .collect();
            pairs.join(", ")
        }
        other => truncate(&other.to_string(), DEFAULT_MAX_LEN),
    }
}

/// Print a tool request before it is dispatched.
pub fn print_tool_request(name: &str, params: &serde_json::Value) {
    eprintln!(
        "{} {} {} ({})",
        timestamp().dimmed(),
        "[TOOL]".cyan().bold(),
        name.bold(),
        format_params(params).dimmed()
    );
}

/// Print the outcome of a batch invocation: a status line on stderr and the
/// reply on stdout.
pub fn print_invocation(result: &InvocationResult) {
    let ts = timestamp();
    if result.ok {
        eprintln!(
            "{} {} Codex completed ({} events)",
            ts.dimmed(),
            "[CODEX]".blue().bold(),
            result.events.len()
        );
    } else {
        eprintln!(
            "{} {} Codex invocation failed",
            ts.dimmed(),
            "[CODEX]".red().bold()
        );
    }
    if let Some(error) = result.error.as_deref().filter(|e| *e != result.reply) {
        eprintln!(
            "{} {} {}",
            ts.dimmed(),
            "[ERROR]".red().bold(),
            truncate(error, 200).red()
        );
    }
    println!("{}", result.reply);
    let _ = io::stdout().flush();
}

/// Print a reply from the API backend.
pub fn print_api_reply(tool: &str, reply: &serde_json::Value) {
    let stubbed = reply.get("stub").and_then(serde_json::Value::as_bool) == Some(true);
    let label = if stubbed {
        "[STUB]".yellow().bold().to_string()
    } else {
        "[API]".green().bold().to_string()
    };
    eprintln!("{} {} {}", timestamp().dimmed(), label, tool);
    print_json(reply);
}

/// Pretty-print a JSON value on stdout.
pub fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
    let _ = io::stdout().flush();
}

/// Print error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
}
