//! Logging setup shared by every code path of the CLI.

use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Logging arguments, applied before anything else runs.
#[derive(Debug, clap::Args)]
pub struct LogArgs {
    /// The log verbosity. Can be one of trace|debug|info|warn|error|off
    #[arg(
        long = "log.level",
        default_value_t = LogLevel::Warn,
        group = "logging",
        ignore_case = true,
        value_enum,
        global = true
    )]
    pub level: LogLevel,

    #[arg(long = "log.format", value_enum, global = true, group = "logging")]
    pub format: Option<LogFormat>,
}

#[derive(Debug, clap::ValueEnum, Clone, Copy)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl ToString for LogLevel {
    fn to_string(&self) -> String {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
        .to_string()
    }
}

/// The format for logs written to stderr.
#[derive(Debug, clap::ValueEnum, Clone, Copy)]
pub enum LogFormat {
    /// One JSON object per line, for programmatic consumers.
    Json,
    /// Plain text with no colors.
    Text,
    /// Plain text with colors for interactive terminals.
    Color,
}

fn default_log_format() -> LogFormat {
    if atty::is(atty::Stream::Stderr) {
        LogFormat::Color
    } else {
        // Running non-interactively; default to JSON so programmatic users
        // don't have to ask for it.
        LogFormat::Json
    }
}

/// Initializes logging: the chosen format on stderr, plus a JSON copy to
/// `log_file` when given. `verbose` raises the level floor to debug. Panics
/// if called twice.
pub fn init(args: &LogArgs, verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let level = if verbose {
        "debug".to_string()
    } else {
        args.level.to_string()
    };
    let filter = EnvFilter::new(level);

    let stderr_layer = match args.format.unwrap_or_else(default_log_format) {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .compact()
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Color => fmt::layer()
            .compact()
            .with_ansi(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            Some(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}
