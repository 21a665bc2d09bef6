//! Operator loop for guided sessions.
//!
//! Prompts for a tool name and its parameters, runs the tool in the
//! session, and repeats until the operator enters an empty name or input
//! ends. `!raw` sends a raw command; `!handoff` gives the terminal to Codex.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead};

use crate::session::{resolve_operator_params, CodexSession, SessionError};

/// Banner printed when the loop starts.
pub const LOOP_BANNER: &str = "[codex-helper] Enter tool name and JSON parameters. Press Enter on an empty
tool name to exit. Prefix parameters with '@path/to/file.json' to load from a
file. Type '!raw' to send a raw Codex command, or '!handoff' to hand control
to the Codex prompt.";

/// Note printed before a handoff.
pub const HANDOFF_NOTE: &str = "[codex-helper] Handing control to Codex; press Ctrl+] to return.";

/// What the operator asked for at the tool-name prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopCommand {
    Exit,
    Raw,
    Handoff,
    Tool(String),
}

impl LoopCommand {
    /// Interpret one line typed at the tool-name prompt.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Self::Exit,
            "!raw" => Self::Raw,
            "!handoff" => Self::Handoff,
            name => Self::Tool(name.to_string()),
        }
    }
}

/// Interactive loop over an operator's input and output.
pub struct OperatorLoop<R, W> {
    input: R,
    out: W,
    terminal: bool,
}

impl<R, W> OperatorLoop<R, W>
where
    R: AsyncBufRead + AsyncRead + Unpin,
    W: Write,
{
    #[must_use]
    pub fn new(input: R, out: W) -> Self {
        Self {
            input,
            out,
            terminal: false,
        }
    }

    /// Treat the input as the operator's terminal, so `!handoff` switches
    /// it to raw mode.
    #[must_use]
    pub fn attached_to_terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    /// Run until the operator exits.
    ///
    /// Invalid parameters, unreadable parameter files and prompt timeouts
    /// are reported to the operator and the loop continues.
    ///
    /// # Errors
    ///
    /// Returns non-recoverable session errors and operator I/O errors.
    pub async fn run(&mut self, session: &mut CodexSession) -> Result<(), SessionError> {
        writeln!(self.out, "{LOOP_BANNER}")?;
        loop {
            let Some(line) = self.ask("tool name> ").await? else {
                break;
            };

            let outcome = match LoopCommand::parse(&line) {
                LoopCommand::Exit => break,
                LoopCommand::Raw => {
                    let Some(raw) = self.ask("codex command> ").await? else {
                        break;
                    };
                    session.send_command(raw.trim_end_matches(['\r', '\n'])).await
                }
                LoopCommand::Handoff => {
                    writeln!(self.out, "{HANDOFF_NOTE}")?;
                    self.out.flush()?;
                    if self.terminal {
                        session.handoff_terminal(&mut self.input).await
                    } else {
                        session.handoff_with(&mut self.input).await
                    }
                }
                LoopCommand::Tool(name) => {
                    let Some(answer) = self.ask("params JSON or @file> ").await? else {
                        break;
                    };
                    match resolve_operator_params(&answer) {
                        Ok(params) => session.run_tool(&name, &params).await,
                        Err(e) => Err(SessionError::InvalidToolParameters(e)),
                    }
                }
            };

            match outcome {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => writeln!(self.out, "[codex-helper] {e}")?,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Print `prompt` and read one line. `None` at end of input.
    async fn ask(&mut self, prompt: &str) -> Result<Option<String>, SessionError> {
        write!(self.out, "{prompt}")?;
        self.out.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            writeln!(self.out)?;
            return Ok(None);
        }
        Ok(Some(line))
    }
}
