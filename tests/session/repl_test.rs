//! Tests for the operator loop driving a fake Codex REPL.

#![cfg(unix)]

use tokio::io::BufReader;

use codex_harness::session::{CodexSession, OperatorLoop, SessionIo, LOOP_BANNER};

use super::{test_config, write_script, SharedBuf, FAKE_CODEX};

#[tokio::test]
async fn loop_runs_tools_and_raw_commands() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_script(dir.path(), FAKE_CODEX);
    let params_file = dir.path().join("params.json");
    std::fs::write(&params_file, "{\"size\": \"small\"}\n").unwrap();

    let out = SharedBuf::default();
    let io = SessionIo::silent().with_sink(Box::new(out.clone()));
    let mut session = CodexSession::start(&test_config(&bin), io).await.unwrap();

    let file_answer = format!("@{}\n", params_file.display());
    let operator = tokio_test::io::Builder::new()
        .read(b"search\n")
        .read(b"{\"q\": 1}\n")
        .read(b"create_image\n")
        .read(file_answer.as_bytes())
        .read(b"!raw\n")
        .read(b"status\n")
        .read(b"analyze\n")
        .read(b"{oops\n")
        .read(b"analyze\n")
        .read(b"@/nonexistent/params.json\n")
        .read(b"\n")
        .build();
    let mut screen = Vec::new();

    OperatorLoop::new(BufReader::new(operator), &mut screen)
        .run(&mut session)
        .await
        .unwrap();
    session.stop().await.unwrap();

    let session_text = out.text();
    assert!(session_text.contains(r#"got: Run tool search with parameters: {"q": 1}"#));
    assert!(session_text.contains(r#"got: Run tool create_image with parameters: {"size": "small"}"#));
    assert!(session_text.contains("got: status"));
    assert!(!session_text.contains("Run tool analyze"));

    let screen = String::from_utf8(screen).unwrap();
    assert!(screen.starts_with(LOOP_BANNER));
    assert!(screen.contains("codex command> "));
    assert!(screen.contains("[codex-helper] Invalid tool parameters: Invalid JSON"));
    assert!(screen.contains("[codex-helper] Invalid tool parameters: Failed to read /nonexistent/params.json"));
}

#[tokio::test]
async fn loop_exits_at_end_of_input() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_script(dir.path(), FAKE_CODEX);
    let mut session = CodexSession::start(&test_config(&bin), SessionIo::silent())
        .await
        .unwrap();

    let operator = tokio_test::io::Builder::new().read(b"search\n").build();
    let mut screen = Vec::new();
    OperatorLoop::new(BufReader::new(operator), &mut screen)
        .run(&mut session)
        .await
        .unwrap();
    session.stop().await.unwrap();

    let screen = String::from_utf8(screen).unwrap();
    assert!(screen.ends_with("params JSON or @file> \n"));
}
