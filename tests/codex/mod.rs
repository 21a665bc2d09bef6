//! Codex process layer tests.

mod batch_test;
mod process_test;

/// Verify the public batch types are exported from the library.
#[test]
fn test_all_codex_types_exported() {
    use codex_harness::codex::{
        parse_output, BatchError, BatchInvoker, EventKind, EventRecord, InvocationResult,
        LaunchEnv, ParsedOutput, ReplyFold, SpawnError, NO_REPLY_PLACEHOLDER,
    };

    let _ = BatchInvoker::new(vec!["codex".to_string()], ".");
    let _ = InvocationResult::stub("x", String::new(), String::new());
    let _ = ReplyFold::default();
    let _ = LaunchEnv::default();
    let _: ParsedOutput = parse_output("");
    let _: fn(&str) -> Result<EventRecord, serde_json::Error> = EventRecord::parse;
    let _: fn() -> SpawnError = || SpawnError::NotFound("codex".to_string());
    let _: fn() -> BatchError = || BatchError::ContextMissing(".".into());
    let _ = EventKind::AgentMessage;
    assert!(!NO_REPLY_PLACEHOLDER.is_empty());
}
