//! Codex Harness - drive the Codex CLI in batch and interactive modes.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tokio::io::BufReader;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use codex_harness::api::{RetryingClient, ToolBackend};
use codex_harness::codex::{BatchInvoker, InvocationResult};
use codex_harness::config::{ConfigLoader, HarnessConfig, SessionConfig};
use codex_harness::display;
use codex_harness::session::{
    open_transcript, resolve_params, CodexSession, OperatorLoop, SessionError, SessionIo,
    HANDOFF_NOTE,
};

#[derive(Parser)]
#[command(
    name = "codex-harness",
    about = "Drive the Codex CLI in batch and interactive modes",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file to use instead of the default search path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a chat prompt with the workspace context to Codex.
    Chat {
        /// The message to send.
        message: String,
        /// Active project slug.
        #[arg(short, long)]
        project: Option<String>,
        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Ask Codex to run a tool in a one-shot invocation.
    RunTool {
        /// Tool name.
        name: String,
        /// JSON parameters (default {}).
        #[arg(long)]
        params: Option<String>,
        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Keep one Codex process alive and run tools in it.
    Session(SessionArgs),
    /// Run a tool through the HTTP backend.
    ApiTool {
        /// Tool name (search, create_image, analyze).
        name: String,
        /// JSON parameters (default {}).
        #[arg(long)]
        params: Option<String>,
    },
}

#[derive(Args)]
struct SessionArgs {
    /// Path to the Codex CLI.
    #[arg(long)]
    codex_bin: Option<String>,
    /// Sandbox mode to request from Codex.
    #[arg(long)]
    sandbox: Option<String>,
    /// Require manual confirmation instead of answering approvals.
    #[arg(long)]
    no_auto_approve: bool,
    /// Run a single tool before entering the loop.
    #[arg(long)]
    tool: Option<String>,
    /// JSON parameters for --tool (default {}).
    #[arg(long)]
    params: Option<String>,
    /// Load JSON parameters for --tool from a file (overrides --params).
    #[arg(long)]
    params_file: Option<PathBuf>,
    /// Keep the session open after --tool.
    #[arg(long)]
    stay: bool,
    /// After scripted runs, attach the terminal directly to Codex.
    #[arg(long)]
    handoff: bool,
    /// Append a copy of the session output to this file.
    #[arg(long)]
    transcript: Option<PathBuf>,
    /// Seconds to wait for the Codex prompt.
    #[arg(long)]
    timeout: Option<u64>,
}

impl SessionArgs {
    fn apply(&self, mut config: SessionConfig) -> SessionConfig {
        if let Some(bin) = &self.codex_bin {
            config.bin.clone_from(bin);
        }
        if let Some(sandbox) = &self.sandbox {
            config.sandbox.clone_from(sandbox);
        }
        if self.no_auto_approve {
            config.auto_approve = false;
        }
        if let Some(transcript) = &self.transcript {
            config.transcript = Some(transcript.clone());
        }
        if let Some(secs) = self.timeout {
            config.prompt_timeout_secs = secs;
        }
        config
    }

    fn runs_loop(&self) -> bool {
        self.tool.is_none() || self.stay || self.handoff
    }
}

fn init_tracing(verbosity: u8) {
    let debug_env = std::env::var("PAI_DEBUG").is_ok_and(|v| !v.is_empty() && v != "0");
    let level = match verbosity {
        0 if debug_env => "debug",
        0 => "warn",
        1 if debug_env => "debug",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<HarnessConfig, Box<dyn Error>> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    Ok(loader.load_with_env()?)
}

fn parse_params(params: Option<&str>) -> Result<serde_json::Value, Box<dyn Error>> {
    let text = resolve_params(params, None)?;
    Ok(serde_json::from_str(&text)?)
}

fn report(result: &InvocationResult, json: bool) -> ExitCode {
    if json {
        display::print_json(&result.to_json());
    } else {
        display::print_invocation(result);
    }
    if result.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn run_session(config: SessionConfig, args: &SessionArgs) -> Result<(), Box<dyn Error>> {
    let mut io = SessionIo::terminal();
    if let Some(path) = &config.transcript {
        io = io.with_sink(Box::new(open_transcript(path)?));
    }

    let mut session = CodexSession::start(&config, io).await?;
    let outcome = drive_session(&mut session, args).await;
    let stopped = session.stop().await;
    outcome?;
    stopped?;
    Ok(())
}

async fn drive_session(session: &mut CodexSession, args: &SessionArgs) -> Result<(), SessionError> {
    if let Some(tool) = &args.tool {
        let params = resolve_params(args.params.as_deref(), args.params_file.as_deref())?;
        let shown = serde_json::from_str::<serde_json::Value>(&params).unwrap_or_default();
        display::print_tool_request(tool, &shown);
        session.run_tool(tool, &params).await?;
    }
    if !args.runs_loop() {
        return Ok(());
    }

    let mut input = BufReader::new(tokio::io::stdin());
    OperatorLoop::new(&mut input, std::io::stdout())
        .attached_to_terminal()
        .run(session)
        .await?;

    if args.handoff {
        println!("{HANDOFF_NOTE}");
        session.handoff_terminal(&mut input).await?;
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Chat {
            message,
            project,
            json,
        } => {
            tracing::info!(project = ?project, "Sending chat prompt");
            let invoker = BatchInvoker::from_config(&config);
            let result = invoker.chat(&message, project.as_deref()).await?;
            Ok(report(&result, json))
        }
        Commands::RunTool { name, params, json } => {
            let params = parse_params(params.as_deref())?;
            display::print_tool_request(&name, &params);
            let invoker = BatchInvoker::from_config(&config);
            let result = invoker.run_tool(&name, &params).await;
            Ok(report(&result, json))
        }
        Commands::Session(args) => {
            let session_config = args.apply(config.session.clone());
            run_session(session_config, &args).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::ApiTool { name, params } => {
            let params = parse_params(params.as_deref())?;
            display::print_tool_request(&name, &params);
            let backend = ToolBackend::new(RetryingClient::from_config(&config.api)?);
            let reply = backend.run_named(&name, &params).await?;
            display::print_api_reply(&name, &reply);
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            display::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
