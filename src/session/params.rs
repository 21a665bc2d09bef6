//! Tool parameter resolution.
//!
//! Parameters always reach Codex as a JSON string. They are validated
//! before anything is sent so a typo never reaches the child process.

use std::path::{Path, PathBuf};

/// Parameters used when none are given.
pub const EMPTY_PARAMS: &str = "{}";

/// Errors from resolving tool parameters.
#[derive(thiserror::Error, Debug)]
pub enum ParamsError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Check that `text` is a JSON document and return it trimmed.
///
/// # Errors
///
/// Returns `ParamsError::InvalidJson` if `text` does not parse.
pub fn validate_params(text: &str) -> Result<String, ParamsError> {
    let candidate = text.trim();
    serde_json::from_str::<serde_json::Value>(candidate)?;
    Ok(candidate.to_string())
}

/// Resolve parameters from an inline string or a file; the file wins.
///
/// # Errors
///
/// Returns `ParamsError` if the file cannot be read or the JSON is invalid.
pub fn resolve_params(inline: Option<&str>, file: Option<&Path>) -> Result<String, ParamsError> {
    if let Some(path) = file {
        return validate_params(&read_params_file(path)?);
    }
    match inline.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => validate_params(text),
        None => Ok(EMPTY_PARAMS.to_string()),
    }
}

/// Resolve parameters typed by an operator: `@path` loads a file, an empty
/// answer means `{}`, anything else is inline JSON.
///
/// # Errors
///
/// Returns `ParamsError` if the file cannot be read or the JSON is invalid.
pub fn resolve_operator_params(answer: &str) -> Result<String, ParamsError> {
    let answer = answer.trim();
    if let Some(path) = answer.strip_prefix('@') {
        return validate_params(&read_params_file(&expand_home(path))?);
    }
    resolve_params(Some(answer), None)
}

fn read_params_file(path: &Path) -> Result<String, ParamsError> {
    std::fs::read_to_string(path).map_err(|source| ParamsError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
