//! Codex process layer: event decoding, answer extraction and batch runs.

mod batch;
mod events;
mod process;
mod stream;

pub use batch::*;
pub use events::*;
pub use process::*;
pub use stream::*;
