//! Interactive Codex sessions: process driver, output fan-out, approval
//! detection and the operator loop.

mod approval;
mod driver;
mod params;
mod repl;
mod tap;

pub use approval::{
    ApprovalDetector, ApprovalState, APPROVAL_MARKERS, APPROVAL_NOTE, APPROVAL_TOKENS,
    APPROVAL_WINDOW, CONFIRMATION_LINE,
};
pub use driver::*;
pub use params::*;
pub use repl::*;
pub use tap::*;
