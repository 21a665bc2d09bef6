//! Codex Harness - drive the Codex CLI in batch and interactive modes.

pub mod api;
pub mod codex;
pub mod config;
pub mod display;
pub mod session;
