//! Tests for one-shot Codex invocations against fake `sh` executables.

use std::path::Path;

use codex_harness::codex::{BatchError, BatchInvoker, NOT_INSTALLED_MESSAGE};

/// Build an invoker that runs `script` through `/bin/sh`, mirroring the
/// real `codex exec --json <prompt>` argument shape.
fn sh_invoker(home: &Path, script: &str) -> BatchInvoker {
    let path = home.join("fake-codex.sh");
    std::fs::write(&path, script).unwrap();
    BatchInvoker::new(
        vec![
            "/bin/sh".to_string(),
            path.display().to_string(),
            "exec".to_string(),
            "--json".to_string(),
        ],
        home,
    )
}

/// Prints a reply and echoes the prompt (last argument) to stderr.
const ECHO_PROMPT: &str = r#"
for last; do :; done
printf '%s\n' '{"msg":{"type":"agent_message","message":"pong"}}'
printf '%s' "$last" >&2
"#;

#[cfg(unix)]
#[tokio::test]
async fn successful_run_returns_reply() {
    let home = tempfile::tempdir().unwrap();
    let invoker = sh_invoker(home.path(), ECHO_PROMPT);

    let result = invoker.invoke("ping").await;

    assert!(result.ok);
    assert_eq!(result.reply, "pong");
    assert_eq!(result.stderr, "ping");
    assert_eq!(result.events.len(), 1);
    assert!(result.error.is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn error_event_is_mirrored_on_success() {
    let home = tempfile::tempdir().unwrap();
    let invoker = sh_invoker(
        home.path(),
        r#"printf '%s\n' '{"msg":{"type":"error","message":"quota exceeded"}}'"#,
    );

    let result = invoker.invoke("hi").await;

    assert!(result.ok);
    assert_eq!(result.reply, "quota exceeded");
    assert_eq!(result.error.as_deref(), Some("quota exceeded"));
}

#[cfg(unix)]
#[tokio::test]
async fn non_zero_exit_is_a_stub() {
    let home = tempfile::tempdir().unwrap();
    let invoker = sh_invoker(
        home.path(),
        r#"
printf '%s\n' '{"msg":{"type":"agent_message","message":"partial"}}'
echo boom >&2
exit 3
"#,
    );

    let result = invoker.invoke("hi").await;

    assert!(!result.ok);
    assert_eq!(result.reply, "Codex CLI failed with exit code 3; check stderr");
    assert_eq!(result.error.as_deref(), Some(result.reply.as_str()));
    assert_eq!(result.stderr, "boom\n");
    assert!(result.stdout.contains("partial"));
    assert!(result.events.is_empty());
}

#[tokio::test]
async fn missing_executable_is_a_stub() {
    let home = tempfile::tempdir().unwrap();
    let invoker = BatchInvoker::new(
        vec!["/nonexistent/bin/codex".to_string(), "exec".to_string()],
        home.path(),
    );

    let result = invoker.invoke("hi").await;

    assert!(!result.ok);
    assert_eq!(result.reply, NOT_INSTALLED_MESSAGE);
    assert_eq!(result.error.as_deref(), Some(NOT_INSTALLED_MESSAGE));
    assert!(result.stdout.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn launch_creates_workspace_tmp() {
    let home = tempfile::tempdir().unwrap();
    let invoker = sh_invoker(home.path(), "printf '%s' \"$TMPDIR\"");

    let result = invoker.invoke("hi").await;

    assert!(result.ok);
    if std::env::var_os("TMPDIR").is_none() && std::env::var_os("PAI_TMPDIR").is_none() {
        assert!(home.path().join("tmp").is_dir());
        assert_eq!(result.reply, home.path().join("tmp").display().to_string());
    }
}

#[cfg(unix)]
#[tokio::test]
async fn chat_prefixes_project_and_context() {
    let home = tempfile::tempdir().unwrap();
    std::fs::write(home.path().join("context.md"), "You are a helpful agent.").unwrap();
    let invoker = sh_invoker(home.path(), ECHO_PROMPT);

    let result = invoker.chat("hello", Some("garden")).await.unwrap();

    assert!(result.ok);
    assert_eq!(
        result.stderr,
        "Active project: garden\n\nYou are a helpful agent.\n\nUser: hello"
    );
}

#[cfg(unix)]
#[tokio::test]
async fn chat_without_project_says_none() {
    let home = tempfile::tempdir().unwrap();
    std::fs::write(home.path().join("context.md"), "ctx").unwrap();
    let invoker = sh_invoker(home.path(), ECHO_PROMPT);

    let result = invoker.chat("hello", None).await.unwrap();
    assert!(result.stderr.starts_with("Active project: none\n\nctx"));
}

#[tokio::test]
async fn chat_requires_context_file() {
    let home = tempfile::tempdir().unwrap();
    let invoker = BatchInvoker::new(vec!["codex".to_string()], home.path());

    let err = invoker.chat("hello", None).await.unwrap_err();
    assert!(matches!(err, BatchError::ContextMissing(ref p) if p == &home.path().join("context.md")));
}

#[cfg(unix)]
#[tokio::test]
async fn run_tool_formats_instruction() {
    let home = tempfile::tempdir().unwrap();
    let invoker = sh_invoker(home.path(), ECHO_PROMPT);

    let result = invoker
        .run_tool("search", &serde_json::json!({"query": "rust"}))
        .await;

    assert!(result.ok);
    assert_eq!(
        result.stderr,
        r#"Run tool search with parameters: {"query":"rust"}"#
    );
}

#[cfg(unix)]
#[tokio::test]
async fn json_output_carries_choices() {
    let home = tempfile::tempdir().unwrap();
    let invoker = sh_invoker(home.path(), ECHO_PROMPT);

    let json = invoker.invoke("ping").await.to_json();

    assert_eq!(json["ok"], true);
    assert_eq!(json["reply"], "pong");
    assert_eq!(json["raw"][0]["msg"]["type"], "agent_message");
    assert_eq!(json["choices"][0]["message"]["role"], "assistant");
    assert_eq!(json["choices"][0]["message"]["content"], "pong");
    assert!(json.get("error").is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn json_output_keeps_error_when_set() {
    let home = tempfile::tempdir().unwrap();
    let invoker = sh_invoker(
        home.path(),
        r#"printf '%s\n' '{"msg":{"type":"error","message":"quota exceeded"}}'"#,
    );

    let json = invoker.invoke("ping").await.to_json();

    assert_eq!(json["ok"], true);
    assert_eq!(json["error"], "quota exceeded");
}
