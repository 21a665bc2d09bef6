//! Tests for the interactive session driver against a fake Codex REPL.

#![cfg(unix)]

use std::time::Duration;

use codex_harness::config::SessionConfig;
use codex_harness::session::{
    open_transcript, ApprovalState, CodexSession, SessionError, SessionIo, APPROVAL_NOTE,
    HANDOFF_ESCAPE,
};

use super::{test_config, write_script, SharedBuf, FAKE_CODEX};

fn captured() -> (SessionIo, SharedBuf, SharedBuf) {
    let out = SharedBuf::default();
    let notes = SharedBuf::default();
    let io = SessionIo::silent()
        .with_sink(Box::new(out.clone()))
        .with_notes(Box::new(notes.clone()));
    (io, out, notes)
}

#[tokio::test]
async fn start_passes_interactive_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_script(dir.path(), FAKE_CODEX);
    let (io, out, _) = captured();

    let session = CodexSession::start(&test_config(&bin), io).await.unwrap();
    assert!(session.id().is_some());
    session.stop().await.unwrap();

    assert!(out
        .text()
        .contains("args: exec --sandbox workspace-write --json"));
}

#[tokio::test]
async fn codex_runs_on_a_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_script(
        dir.path(),
        "#!/bin/sh\n\
         [ -t 0 ] && echo stdin=tty || echo stdin=pipe\n\
         [ -t 1 ] && echo stdout=tty || echo stdout=pipe\n\
         [ -t 2 ] && echo stderr=tty || echo stderr=pipe\n\
         printf 'codex> '\n\
         read -r line\n",
    );
    let (io, out, _) = captured();

    let session = CodexSession::start(&test_config(&bin), io).await.unwrap();
    session.stop().await.unwrap();

    let text = out.text();
    assert!(text.contains("stdin=tty"), "{text}");
    assert!(text.contains("stdout=tty"), "{text}");
    assert!(text.contains("stderr=tty"), "{text}");
}

#[tokio::test]
async fn typed_lines_are_echoed_by_the_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_script(dir.path(), FAKE_CODEX);
    let (io, out, _) = captured();

    let mut session = CodexSession::start(&test_config(&bin), io).await.unwrap();
    session.send_command("hello there").await.unwrap();
    session.stop().await.unwrap();

    let text = out.text();
    let echoed = text.find("hello there\r\n").unwrap();
    let reply = text.find("got: hello there").unwrap();
    assert!(echoed < reply);
}

#[tokio::test]
async fn commands_are_echoed_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_script(dir.path(), FAKE_CODEX);
    let (io, out, _) = captured();

    let mut session = CodexSession::start(&test_config(&bin), io).await.unwrap();
    session.send_command("first").await.unwrap();
    session.send_command("second").await.unwrap();
    session.stop().await.unwrap();

    let text = out.text();
    let first = text.find("got: first").unwrap();
    let second = text.find("got: second").unwrap();
    assert!(first < second);
    assert!(text.contains("bye"));
}

#[tokio::test]
async fn run_tool_sends_instruction() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_script(dir.path(), FAKE_CODEX);
    let (io, out, _) = captured();

    let mut session = CodexSession::start(&test_config(&bin), io).await.unwrap();
    session
        .run_tool("search", " {\"query\":\"tide tables\"} ")
        .await
        .unwrap();
    session.stop().await.unwrap();

    assert!(out
        .text()
        .contains(r#"got: Run tool search with parameters: {"query":"tide tables"}"#));
}

#[tokio::test]
async fn invalid_parameters_are_never_sent() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_script(dir.path(), FAKE_CODEX);
    let (io, out, _) = captured();

    let mut session = CodexSession::start(&test_config(&bin), io).await.unwrap();
    let err = session.run_tool("search", "{query:").await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidToolParameters(_)));
    assert!(err.is_recoverable());

    session.send_command("still alive").await.unwrap();
    session.stop().await.unwrap();

    let text = out.text();
    assert!(!text.contains("Run tool"));
    assert!(text.contains("got: still alive"));
}

#[tokio::test]
async fn approval_prompt_is_answered_once() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_script(dir.path(), FAKE_CODEX);
    let (io, out, notes) = captured();
    let config = SessionConfig {
        prompt_timeout_secs: 1,
        ..test_config(&bin)
    };

    let mut session = CodexSession::start(&config, io).await.unwrap();
    session.send_command("approve").await.unwrap();
    assert_eq!(session.tap().approver().state(), ApprovalState::Sent);

    // The second question goes unanswered until the exit line arrives.
    let err = session.send_command("approve").await.unwrap_err();
    assert!(matches!(err, SessionError::PromptTimeout(_)));
    session.stop().await.unwrap();

    let text = out.text();
    // The terminal turns each newline into CRLF.
    assert!(text.contains("approved: y\r\n"));
    assert!(text.contains("approved: exit\r\n"));
    assert_eq!(notes.text(), APPROVAL_NOTE);
}

#[tokio::test]
async fn disabled_approval_never_answers() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_script(dir.path(), FAKE_CODEX);
    let (io, out, notes) = captured();
    let config = SessionConfig {
        auto_approve: false,
        prompt_timeout_secs: 1,
        ..test_config(&bin)
    };

    let mut session = CodexSession::start(&config, io).await.unwrap();
    let err = session.send_command("approve").await.unwrap_err();
    assert!(matches!(err, SessionError::PromptTimeout(d) if d == Duration::from_secs(1)));
    assert_eq!(session.tap().approver().state(), ApprovalState::Disabled);
    session.stop().await.unwrap();

    assert!(!out.text().contains("approved: y"));
    assert!(notes.text().is_empty());
}

#[tokio::test]
async fn slow_command_times_out_and_session_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_script(dir.path(), FAKE_CODEX);
    let (io, out, _) = captured();
    let config = SessionConfig {
        prompt_timeout_secs: 1,
        ..test_config(&bin)
    };

    let mut session = CodexSession::start(&config, io).await.unwrap();
    let err = session.send_command("slow").await.unwrap_err();
    assert!(err.is_recoverable());

    // Let the slow command finish so its prompt is already buffered.
    tokio::time::sleep(Duration::from_secs(3)).await;
    session.send_command("after").await.unwrap();
    session.stop().await.unwrap();
    assert!(out.text().contains("got: after"));
}

#[tokio::test]
async fn start_fails_when_prompt_never_appears() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_script(dir.path(), "#!/bin/sh\necho warming up\nsleep 3\n");
    let config = SessionConfig {
        prompt_timeout_secs: 1,
        ..test_config(&bin)
    };

    let err = CodexSession::start(&config, SessionIo::silent())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::PromptTimeout(_)));
}

#[tokio::test]
async fn start_fails_when_codex_exits_early() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_script(dir.path(), "#!/bin/sh\necho 'not logged in' >&2\nexit 1\n");
    let (io, out, _) = captured();

    let err = CodexSession::start(&test_config(&bin), io).await.unwrap_err();
    assert!(matches!(err, SessionError::Exited));
    assert!(out.text().contains("not logged in"));
}

#[tokio::test]
async fn stop_terminates_unresponsive_codex() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_script(
        dir.path(),
        "#!/bin/sh\nprintf 'codex> '\nwhile :; do sleep 1; done\n",
    );
    let config = SessionConfig {
        exit_grace_secs: 1,
        ..test_config(&bin)
    };

    let session = CodexSession::start(&config, SessionIo::silent())
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(10), session.stop())
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn handoff_forwards_until_escape() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_script(dir.path(), FAKE_CODEX);
    let (io, out, _) = captured();

    let mut session = CodexSession::start(&test_config(&bin), io).await.unwrap();
    let mut operator = tokio_test::io::Builder::new()
        .read(b"typed by hand\n")
        .read(&[b'x', HANDOFF_ESCAPE, b'y'])
        .build();
    session.handoff_with(&mut operator).await.unwrap();
    session.stop().await.unwrap();

    let text = out.text();
    assert!(text.contains("got: typed by hand"));
    // Bytes after the escape are dropped; the exit line completes "x".
    assert!(text.contains("got: xexit"));
}

#[tokio::test]
async fn terminal_handoff_returns_on_escape() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_script(dir.path(), FAKE_CODEX);
    let (io, out, _) = captured();

    let mut session = CodexSession::start(&test_config(&bin), io).await.unwrap();
    let mut operator = tokio_test::io::Builder::new()
        .read(b"by terminal\n")
        .read(&[HANDOFF_ESCAPE])
        .build();
    session.handoff_terminal(&mut operator).await.unwrap();
    session.send_command("afterwards").await.unwrap();
    session.stop().await.unwrap();

    let text = out.text();
    assert!(text.contains("got: by terminal"));
    assert!(text.contains("got: afterwards"));
}

#[tokio::test]
async fn transcript_receives_copy_of_output() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_script(dir.path(), FAKE_CODEX);
    let transcript = dir.path().join("logs").join("session.log");
    let io = SessionIo::silent().with_sink(Box::new(open_transcript(&transcript).unwrap()));

    let mut session = CodexSession::start(&test_config(&bin), io).await.unwrap();
    session.send_command("hello transcript").await.unwrap();
    session.stop().await.unwrap();

    let text = std::fs::read_to_string(&transcript).unwrap();
    assert!(text.starts_with("\n# Codex tool session "));
    assert!(text.contains("got: hello transcript"));
}
