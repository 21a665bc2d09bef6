//! HTTP-backed alternative to the local Codex process.

mod client;
mod tools;

pub use client::*;
pub use tools::*;
