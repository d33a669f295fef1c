//! Termline CLI - Command-line interface
//!
//! Monitors a TCP endpoint through the terminal pipeline, replays captured
//! bytes offline and validates configuration files.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use termline_core::cli::{print_exit_codes, render_event, render_snapshot, CliResult, ExitCodes, OutputFormat};
use termline_core::config::{AppConfig, ConfigError};
use termline_core::core::codec::numeric;
use termline_core::core::terminal::TerminalError;
use termline_core::{
    AutoAction, AutoActionSettings, AutoResponseSettings, CodecError, Direction, EventEnvelope,
    Pipeline, Radix, ResponsePayload, TcpConfig, TcpTransport, Terminal, TerminalSettings,
    TerminalState, TextEncoding, TransportError, TriggerSettings,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Stream direction for offline replay
#[derive(Debug, Clone, Copy, ValueEnum)]
enum DirectionArg {
    /// Received data
    Rx,
    /// Sent data
    Tx,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Rx => Direction::Rx,
            DirectionArg::Tx => Direction::Tx,
        }
    }
}

/// Termline CLI
#[derive(Parser, Debug)]
#[command(
    name = "termline",
    author = "Termline Team",
    version,
    about = "Line-oriented terminal monitor with automatic actions and responses",
    long_about = None
)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, env = "TERMLINE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Terminal options shared by the monitoring commands
#[derive(Args, Debug, Clone)]
struct TerminalArgs {
    /// Named terminal from the configuration file
    #[arg(short = 'n', long)]
    terminal: Option<String>,

    /// EOL sequence (escapes allowed, e.g. "\r\n")
    #[arg(long)]
    eol: Option<String>,

    /// Display radix (string, char, bin, oct, dec, hex, unicode)
    #[arg(short, long)]
    radix: Option<Radix>,

    /// Text encoding (utf-8, ascii, latin-1, utf-16le, utf-16be)
    #[arg(short, long)]
    encoding: Option<TextEncoding>,

    /// Highlight lines matching this text
    #[arg(long)]
    highlight: Option<String>,

    /// AutoResponse trigger text
    #[arg(long, requires = "respond_with")]
    respond_on: Option<String>,

    /// AutoResponse reply (escapes allowed)
    #[arg(long, requires = "respond_on")]
    respond_with: Option<String>,

    /// Match triggers case-insensitively
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// Match triggers on whole words only
    #[arg(short = 'w', long)]
    whole_word: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Monitor a TCP endpoint
    Tcp {
        /// Host address
        #[arg(short = 'H', long)]
        host: String,

        /// Port number
        #[arg(short, long, default_value = "23")]
        port: u16,

        /// Connection timeout (seconds)
        #[arg(long, default_value = "10")]
        timeout: u64,

        /// Send these lines after connecting
        #[arg(short = 's', long = "send")]
        send: Vec<String>,

        /// Close after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,

        #[command(flatten)]
        terminal: TerminalArgs,
    },

    /// Replay captured bytes through the pipeline
    Decode {
        /// Capture file
        #[arg(long, conflicts_with = "hex", required_unless_present = "hex")]
        file: Option<PathBuf>,

        /// Hex bytes, e.g. "50 49 4E 47 0D 0A"
        #[arg(long)]
        hex: Option<String>,

        /// Direction the bytes travelled
        #[arg(long, value_enum, default_value_t = DirectionArg::Rx)]
        direction: DirectionArg,

        #[command(flatten)]
        terminal: TerminalArgs,
    },

    /// Validate a configuration file
    Check {
        /// File to check (defaults to --config or the default location)
        file: Option<PathBuf>,
    },

    /// Show exit code table
    ExitCodes,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Commands::ExitCodes = cli.command {
        print_exit_codes();
        return ExitCode::SUCCESS;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => return finish(&cli, classify(&e)),
    };
    let _guard = init_logging(&cli, &config);
    tracing::debug!("Starting termline v{}", termline_core::VERSION);

    let result = match &cli.command {
        Commands::Tcp {
            host,
            port,
            timeout,
            send,
            duration,
            terminal,
        } => {
            let tcp = TcpConfig::new(host, *port).timeout(*timeout);
            run_tcp(&cli, &config, &tcp, send, *duration, terminal).await
        }
        Commands::Decode {
            file,
            hex,
            direction,
            terminal,
        } => run_decode(&cli, &config, file.as_ref(), hex.as_deref(), *direction, terminal),
        Commands::Check { .. } => Ok(check_summary(&config)),
        Commands::ExitCodes => Ok(CliResult::success()),
    };

    finish(&cli, result.unwrap_or_else(|e| classify(&e)))
}

fn finish(cli: &Cli, result: CliResult) -> ExitCode {
    match (&result, result.message()) {
        (CliResult::Error(..), Some(message)) => eprintln!("Error: {}", message),
        (CliResult::Success(_), Some(message)) if !cli.quiet => eprintln!("{}", message),
        _ => {}
    }
    result.to_exit_code()
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let explicit = match &cli.command {
        Commands::Check { file: Some(file) } => Some(file),
        _ => cli.config.as_ref(),
    };
    match explicit {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("Loading {}", path.display())),
        None => Ok(AppConfig::load()?),
    }
}

fn init_logging(cli: &Cli, config: &AppConfig) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::EnvFilter;

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
    guard
}

/// Map an error chain to an exit code
fn classify(err: &anyhow::Error) -> CliResult {
    let message = format!("{:#}", err);
    let code = if let Some(e) = err.downcast_ref::<ConfigError>() {
        match e {
            ConfigError::Io(io) => ExitCodes::for_io(io.kind()),
            _ => ExitCodes::CONFIG_ERROR,
        }
    } else if let Some(e) = err.downcast_ref::<TerminalError>() {
        match e {
            TerminalError::Transport(TransportError::Timeout(_)) => ExitCodes::TIMEOUT,
            TerminalError::Transport(_) => ExitCodes::TRANSPORT_FAULT,
            TerminalError::Configuration(_) => ExitCodes::CONFIG_ERROR,
            _ => ExitCodes::ERROR,
        }
    } else if let Some(e) = err.downcast_ref::<TransportError>() {
        match e {
            TransportError::Timeout(_) => ExitCodes::TIMEOUT,
            TransportError::ConnectionFailed(_) => ExitCodes::CONNECTION_FAILED,
            _ => ExitCodes::TRANSPORT_FAULT,
        }
    } else if err.downcast_ref::<CodecError>().is_some() {
        ExitCodes::INVALID_INPUT
    } else if let Some(e) = err.downcast_ref::<std::io::Error>() {
        ExitCodes::for_io(e.kind())
    } else {
        ExitCodes::ERROR
    };
    CliResult::error(code, message)
}

/// Settings from the configuration file with command-line overrides applied
fn terminal_settings(config: &AppConfig, args: &TerminalArgs) -> anyhow::Result<TerminalSettings> {
    let mut settings = match &args.terminal {
        Some(name) => config
            .terminal(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownTerminal(name.clone()))?,
        None => config.terminals.first().cloned().unwrap_or_default(),
    };

    if let Some(eol) = &args.eol {
        settings.line.eol = eol.clone();
    }
    if let Some(radix) = args.radix {
        settings.display.radix = radix;
        settings.display.separate_tx_rx = false;
    }
    if let Some(encoding) = args.encoding {
        settings.display.encoding = encoding;
    }

    let trigger = |pattern: &str| {
        TriggerSettings::text(pattern)
            .case_sensitive(!args.ignore_case)
            .whole_word(args.whole_word)
    };
    if let Some(pattern) = &args.highlight {
        settings.auto_action = Some(AutoActionSettings::new(trigger(pattern), AutoAction::Highlight));
    }
    if let (Some(pattern), Some(reply)) = (&args.respond_on, &args.respond_with) {
        settings.auto_response = Some(AutoResponseSettings::new(
            trigger(pattern),
            ResponsePayload::Text(reply.clone()),
        ));
    }

    settings
        .validate()
        .map_err(|source| ConfigError::Invalid {
            terminal: settings.name.clone(),
            source,
        })?;
    Ok(settings)
}

fn print_events(format: OutputFormat, quiet: bool, envelopes: impl IntoIterator<Item = EventEnvelope>) {
    for envelope in envelopes {
        if quiet && format == OutputFormat::Text {
            continue;
        }
        if let Some(line) = render_event(&envelope, format) {
            println!("{}", line);
        }
    }
}

async fn run_tcp(
    cli: &Cli,
    config: &AppConfig,
    tcp: &TcpConfig,
    send: &[String],
    duration: Option<u64>,
    args: &TerminalArgs,
) -> anyhow::Result<CliResult> {
    let settings = terminal_settings(config, args)?;

    if !cli.quiet {
        eprintln!("Connecting to {}...", tcp.address());
    }
    let transport = TcpTransport::connect(tcp).await?;

    let mut terminal = Terminal::new(settings)?;
    let events = terminal.subscribe();
    let (format, quiet) = (cli.format, cli.quiet);
    let printer = std::thread::spawn(move || print_events(format, quiet, events));

    terminal.start(Box::new(transport))?;
    if !cli.quiet {
        eprintln!("Connected. Press Ctrl+C to exit.");
    }

    let stop = CancellationToken::new();
    let on_interrupt = stop.clone();
    ctrlc::set_handler(move || on_interrupt.cancel())?;

    for line in send {
        terminal.send_line(line).await?;
    }

    let limit = async {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    let interrupted = tokio::select! {
        _ = stop.cancelled() => true,
        _ = limit => false,
        finished = terminal.wait() => {
            finished?;
            false
        }
    };

    let faulted = terminal.state() == TerminalState::Faulted;
    let snapshot = terminal.close().await?;
    let _ = printer.join();

    if !cli.quiet {
        match cli.format {
            OutputFormat::Json => println!("{}", render_snapshot(&snapshot, cli.format)),
            OutputFormat::Text => eprintln!("{}", render_snapshot(&snapshot, cli.format)),
        }
    }

    Ok(if faulted {
        CliResult::error(ExitCodes::TRANSPORT_FAULT, "Connection lost")
    } else if interrupted {
        CliResult::error(ExitCodes::CANCELLED, "Interrupted")
    } else {
        CliResult::success()
    })
}

fn run_decode(
    cli: &Cli,
    config: &AppConfig,
    file: Option<&PathBuf>,
    hex: Option<&str>,
    direction: DirectionArg,
    args: &TerminalArgs,
) -> anyhow::Result<CliResult> {
    let settings = terminal_settings(config, args)?;
    let (source, data) = match (file, hex) {
        (Some(path), _) => (
            path.display().to_string(),
            std::fs::read(path).with_context(|| format!("Reading {}", path.display()))?,
        ),
        (None, Some(hex)) => ("hex".to_string(), numeric::parse_tokens(Radix::Hex, hex)?),
        (None, None) => return Ok(CliResult::error(ExitCodes::INVALID_ARGS, "No input given")),
    };

    let now = chrono::Local::now();
    let mut pipeline = Pipeline::new(&settings, &source, now)?;
    let out = pipeline.replay(direction.into(), &data, now);

    let terminal = Uuid::new_v4();
    let envelopes = out
        .events
        .into_iter()
        .zip(1..)
        .map(|(event, sequence)| EventEnvelope {
            terminal,
            sequence,
            event,
        });
    print_events(cli.format, cli.quiet, envelopes);

    if !cli.quiet && cli.format == OutputFormat::Text {
        eprintln!("{}", render_snapshot(&pipeline.snapshot(now), cli.format));
    }
    Ok(CliResult::success())
}

fn check_summary(config: &AppConfig) -> CliResult {
    let names: Vec<_> = config.terminals.iter().map(|t| t.name.as_str()).collect();
    CliResult::success_with_message(format!(
        "Configuration valid: {} terminal(s) {}",
        names.len(),
        names.join(", ")
    ))
}
