//! Interactive Codex session driver.
//!
//! A [`CodexSession`] keeps one Codex process alive across many commands.
//! Codex runs on a pseudo-terminal so it behaves as it would for a person
//! at a keyboard; stdout and stderr arrive merged on the terminal master.
//! A reader thread hands raw chunks to the driver, which pushes every chunk
//! through the [`OutputTap`] (terminal, transcript, approval detector) and
//! scans it for the ready prompt. Input goes through a single writer thread
//! so that commands and auto-approvals share one ordered stream.

use std::fmt;
use std::io::{IsTerminal, Read, Write};
use std::sync::OnceLock;
use std::time::Duration;

use portable_pty::{native_pty_system, CommandBuilder, MasterPty, PtySize};
use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::{self, Receiver, Sender, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;

use crate::codex::{graceful_terminate, resolve_executable, tool_prompt, wait_for_exit, SpawnError};
use crate::config::SessionConfig;
use crate::session::approval::trim_to_tail;
use crate::session::{validate_params, ApprovalDetector, OutputTap, ParamsError};

/// Ready prompt printed by Codex when it accepts the next command.
pub const READY_PROMPT_PATTERN: &str = r"codex>\s*";

/// Command that ends the session.
pub const EXIT_COMMAND: &str = "exit";

/// Byte that returns control from [`CodexSession::handoff`] (Ctrl+]).
pub const HANDOFF_ESCAPE: u8 = 0x1d;

/// Output channel capacity, in chunks.
const OUTPUT_CHANNEL_BUFFER: usize = 64;

/// Read size for the output reader.
const READ_CHUNK: usize = 4096;

/// Terminal size used when the operator's terminal size is unknown.
const FALLBACK_SIZE: (u16, u16) = (200, 50);

/// Unmatched output kept while scanning for the prompt.
const PROMPT_SCAN_WINDOW: usize = 256;

fn ready_prompt() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| Regex::new(READY_PROMPT_PATTERN).expect("prompt regex must compile"))
}

/// Error type for session operations.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// The Codex executable could not be resolved.
    #[error("Unable to find Codex CLI '{0}'. Install it or set --codex-bin.")]
    ExecutableNotFound(String),
    /// Spawning failed after the executable was found.
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    /// The pseudo-terminal could not be set up.
    #[error("Terminal setup failed: {0}")]
    Pty(String),
    /// The ready prompt did not appear in time.
    #[error("Timed out after {0:?} waiting for the Codex prompt")]
    PromptTimeout(Duration),
    /// Output ended while waiting for the prompt.
    #[error("Codex exited before printing its prompt")]
    Exited,
    /// Input could not be delivered because the process is gone.
    #[error("Codex input closed")]
    InputClosed,
    /// Tool parameters were rejected before anything was sent.
    #[error("Invalid tool parameters: {0}")]
    InvalidToolParameters(#[from] ParamsError),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Errors after which the session can keep accepting commands.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::PromptTimeout(_) | Self::InvalidToolParameters(_))
    }
}

/// Writers attached to a session.
pub struct SessionIo {
    sinks: Vec<Box<dyn Write + Send>>,
    notes: Option<Box<dyn Write + Send>>,
}

impl SessionIo {
    /// Echo output to stdout and write notes to stderr.
    #[must_use]
    pub fn terminal() -> Self {
        Self {
            sinks: vec![Box::new(std::io::stdout())],
            notes: Some(Box::new(std::io::stderr())),
        }
    }

    /// No sinks and no notes.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            sinks: Vec::new(),
            notes: None,
        }
    }

    /// Register another output sink after the existing ones.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn Write + Send>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Replace the side channel for operator notes.
    #[must_use]
    pub fn with_notes(mut self, notes: Box<dyn Write + Send>) -> Self {
        self.notes = Some(notes);
        self
    }
}

/// Kills the Codex child if it is still running when dropped.
struct ChildGuard(Box<dyn portable_pty::Child + Send + Sync>);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if matches!(self.0.try_wait(), Ok(None)) {
            let _ = self.0.kill();
        }
    }
}

/// A running interactive Codex session.
pub struct CodexSession {
    child: ChildGuard,
    // Dropping the master hangs up the terminal.
    master: Box<dyn MasterPty + Send>,
    input: UnboundedSender<Vec<u8>>,
    output: Receiver<Vec<u8>>,
    tap: OutputTap,
    pending: String,
    prompt_timeout: Duration,
    exit_grace: Duration,
}

impl fmt::Debug for CodexSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodexSession")
            .field("pid", &self.id())
            .field("tap", &self.tap)
            .field("prompt_timeout", &self.prompt_timeout)
            .field("exit_grace", &self.exit_grace)
            .finish_non_exhaustive()
    }
}

impl CodexSession {
    /// Spawn Codex on a pseudo-terminal and wait for its first prompt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ExecutableNotFound` if the binary cannot be
    /// resolved, `SessionError::Pty` or `SessionError::Spawn` if it fails to
    /// start, and a prompt error if the first prompt does not appear.
    pub async fn start(config: &SessionConfig, io: SessionIo) -> Result<Self, SessionError> {
        let program = resolve_executable(&config.bin)
            .ok_or_else(|| SessionError::ExecutableNotFound(config.bin.clone()))?;

        tracing::info!(program = %program.display(), sandbox = %config.sandbox, "Starting Codex session");

        let (cols, rows) = crossterm::terminal::size().unwrap_or(FALLBACK_SIZE);
        let pair = native_pty_system()
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| SessionError::Pty(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&program);
        cmd.args(config.interactive_args());
        for (key, value) in std::env::vars() {
            cmd.env(key, value);
        }
        if std::env::var_os("TERM").is_none() {
            cmd.env("TERM", "xterm-256color");
        }
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }

        let child = pair.slave.spawn_command(cmd).map_err(|e| {
            SpawnError::Io(std::io::Error::other(format!("{}: {e}", config.bin)))
        })?;
        let child = ChildGuard(child);
        // Only the child may hold the slave, so output ends when it exits.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| SessionError::Pty(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| SessionError::Pty(e.to_string()))?;

        let (input, input_rx) = mpsc::unbounded_channel();
        spawn_writer(writer, input_rx)?;

        let (output_tx, output) = mpsc::channel(OUTPUT_CHANNEL_BUFFER);
        spawn_reader(reader, output_tx)?;

        let approver = if config.auto_approve {
            ApprovalDetector::new(input.downgrade(), io.notes)
        } else {
            ApprovalDetector::disabled()
        };

        let mut session = Self {
            child,
            master: pair.master,
            input,
            output,
            tap: OutputTap::new(io.sinks, approver),
            pending: String::new(),
            prompt_timeout: config.prompt_timeout(),
            exit_grace: config.exit_grace(),
        };

        session.wait_for_prompt().await?;
        Ok(session)
    }

    /// Process ID of the Codex child.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.0.process_id()
    }

    #[must_use]
    pub fn tap(&self) -> &OutputTap {
        &self.tap
    }

    /// Send one line and wait for the next prompt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::PromptTimeout` if the prompt does not reappear
    /// in time, or `SessionError::Exited` if output ends first.
    pub async fn send_command(&mut self, text: &str) -> Result<(), SessionError> {
        self.send_line(text)?;
        self.wait_for_prompt().await
    }

    /// Ask Codex to run `name` with `params_json`.
    ///
    /// The parameters are validated first; on invalid JSON nothing is sent.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidToolParameters` for malformed JSON, or
    /// any error from [`CodexSession::send_command`].
    pub async fn run_tool(&mut self, name: &str, params_json: &str) -> Result<(), SessionError> {
        let params = validate_params(params_json)?;
        tracing::debug!(tool = %name, "Running tool in session");
        self.send_command(&tool_prompt(name, &params)).await
    }

    /// Hand the session to the operator's terminal until Ctrl+] is typed.
    ///
    /// # Errors
    ///
    /// Returns an error if reading operator input fails or Codex input is
    /// closed.
    pub async fn handoff(&mut self) -> Result<(), SessionError> {
        self.handoff_terminal(&mut tokio::io::stdin()).await
    }

    /// Hand the session to `operator`, with the controlling terminal in raw
    /// mode for the duration.
    ///
    /// Keystrokes then reach Codex one at a time and Ctrl+] returns control
    /// without waiting for Enter. The terminal mode is restored on every
    /// exit path.
    ///
    /// # Errors
    ///
    /// Returns an error if reading operator input fails or Codex input is
    /// closed.
    pub async fn handoff_terminal<R>(&mut self, operator: &mut R) -> Result<(), SessionError>
    where
        R: AsyncRead + Unpin,
    {
        let _raw = RawModeGuard::acquire();
        self.handoff_with(operator).await
    }

    /// Like [`CodexSession::handoff`], reading operator input from `operator`
    /// without touching the terminal mode.
    ///
    /// Returns when the escape byte is read, the operator input ends, or
    /// Codex output ends.
    ///
    /// # Errors
    ///
    /// Returns an error if reading operator input fails or Codex input is
    /// closed.
    pub async fn handoff_with<R>(&mut self, operator: &mut R) -> Result<(), SessionError>
    where
        R: AsyncRead + Unpin,
    {
        tracing::info!("Handing control to operator");
        let mut buf = [0u8; 1024];
        loop {
            tokio::select! {
                read = operator.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        break;
                    }
                    let data = &buf[..n];
                    let escape = data.iter().position(|b| *b == HANDOFF_ESCAPE);
                    let forward = escape.map_or(data, |pos| &data[..pos]);
                    if !forward.is_empty() {
                        self.input
                            .send(forward.to_vec())
                            .map_err(|_| SessionError::InputClosed)?;
                    }
                    if escape.is_some() {
                        break;
                    }
                }
                chunk = self.output.recv() => match chunk {
                    Some(chunk) => absorb(&mut self.tap, &mut self.pending, &chunk),
                    None => break,
                },
            }
        }
        // Anything typed during handoff is not a pending prompt match.
        self.pending.clear();
        tracing::info!("Control returned from operator");
        Ok(())
    }

    /// Send the exit command, wait for Codex to finish and release it.
    ///
    /// Falls back to termination if output has not ended within the exit
    /// grace period. Safe to call while a command is still in flight.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be reaped.
    pub async fn stop(self) -> Result<(), SessionError> {
        let Self {
            mut child,
            master,
            input,
            mut output,
            mut tap,
            mut pending,
            exit_grace,
            ..
        } = self;

        if input.send(format!("{EXIT_COMMAND}\n").into_bytes()).is_err() {
            tracing::debug!("Codex input already closed");
        }
        drop(input);

        let deadline = Instant::now() + exit_grace;
        let drained = loop {
            match tokio::time::timeout_at(deadline, output.recv()).await {
                Ok(Some(chunk)) => absorb(&mut tap, &mut pending, &chunk),
                Ok(None) => break true,
                Err(_) => break false,
            }
        };
        tap.flush();

        if drained {
            if let Some(status) = wait_for_exit(&mut *child.0, exit_grace).await? {
                tracing::info!(?status, "Codex session ended");
                return Ok(());
            }
            tracing::warn!("Codex closed output but did not exit");
        } else {
            tracing::warn!(grace = ?exit_grace, "Codex did not exit in time; terminating");
        }

        let status = graceful_terminate(&mut *child.0, exit_grace).await?;
        tracing::info!(?status, "Codex session terminated");
        drop(master);
        Ok(())
    }

    fn send_line(&self, text: &str) -> Result<(), SessionError> {
        self.input
            .send(format!("{text}\n").into_bytes())
            .map_err(|_| SessionError::InputClosed)
    }

    async fn wait_for_prompt(&mut self) -> Result<(), SessionError> {
        let deadline = Instant::now() + self.prompt_timeout;
        loop {
            if let Some(found) = ready_prompt().find(&self.pending) {
                let end = found.end();
                self.pending.drain(..end);
                return Ok(());
            }
            trim_to_tail(&mut self.pending, PROMPT_SCAN_WINDOW);

            match tokio::time::timeout_at(deadline, self.output.recv()).await {
                Ok(Some(chunk)) => absorb(&mut self.tap, &mut self.pending, &chunk),
                Ok(None) => return Err(SessionError::Exited),
                Err(_) => {
                    tracing::warn!(timeout = ?self.prompt_timeout, "Prompt wait timed out");
                    return Err(SessionError::PromptTimeout(self.prompt_timeout));
                }
            }
        }
    }
}

/// Route one output chunk to the tap and the prompt scanner.
fn absorb(tap: &mut OutputTap, pending: &mut String, chunk: &[u8]) {
    if let Err(e) = tap.write(chunk) {
        tracing::warn!(error = %e, "Session output sink failed");
    }
    pending.push_str(&String::from_utf8_lossy(chunk));
}

/// Restores cooked mode on drop.
struct RawModeGuard;

impl RawModeGuard {
    /// Switch the controlling terminal to raw mode when stdin is one.
    fn acquire() -> Option<Self> {
        if !std::io::stdin().is_terminal() {
            return None;
        }
        match crossterm::terminal::enable_raw_mode() {
            Ok(()) => Some(Self),
            Err(e) => {
                tracing::warn!(error = %e, "Could not enable raw mode; Ctrl+] needs Enter");
                None
            }
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = crossterm::terminal::disable_raw_mode() {
            tracing::warn!(error = %e, "Failed to restore terminal mode");
        }
    }
}

fn spawn_writer(
    mut writer: Box<dyn Write + Send>,
    mut rx: UnboundedReceiver<Vec<u8>>,
) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("codex-input".to_string())
        .spawn(move || {
            while let Some(bytes) = rx.blocking_recv() {
                if let Err(e) = writer.write_all(&bytes).and_then(|()| writer.flush()) {
                    tracing::debug!(error = %e, "Codex input closed");
                    return;
                }
            }
        })?;
    Ok(())
}

// A plain thread rather than `spawn_blocking`: a read blocked on a hung
// child must not hold up runtime shutdown.
fn spawn_reader(mut reader: Box<dyn Read + Send>, tx: Sender<Vec<u8>>) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("codex-output".to_string())
        .spawn(move || {
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => return,
                    Ok(n) => {
                        if tx.blocking_send(buf[..n].to_vec()).is_err() {
                            return;
                        }
                    }
                    // EIO once the child side of the terminal is closed.
                    Err(e) => {
                        tracing::debug!(error = %e, "Codex output read ended");
                        return;
                    }
                }
            }
        })?;
    Ok(())
}
