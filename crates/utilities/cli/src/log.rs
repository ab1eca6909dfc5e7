//! Log level arguments and tracing subscriber setup.

use crate::{CliError, CliResult};
use clap::{Args, ValueEnum};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// The verbosity of log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Debug and above.
    Debug,
    /// Info and above.
    #[default]
    Info,
    /// Warnings and errors.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// The tracing filter of this level.
    pub const fn as_filter(self) -> LevelFilter {
        match self {
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warn => LevelFilter::WARN,
            Self::Error => LevelFilter::ERROR,
        }
    }
}

/// Logging arguments.
#[derive(Args, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogArgs {
    /// Minimum level of emitted logs. `RUST_LOG`, when set, takes precedence.
    #[arg(
        long = "log-level",
        value_enum,
        default_value_t = LogLevel::Info,
        env = "LOG_LEVEL",
        global = true
    )]
    pub level: LogLevel,
}

impl LogArgs {
    /// Builds the filter: `RUST_LOG` directives if present, the configured level otherwise.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::builder().with_default_directive(self.level.as_filter().into()).from_env_lossy()
    }
}

/// Installs the global fmt subscriber filtered by `args`.
pub fn init_tracing_subscriber(args: &LogArgs) -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(args.env_filter())
        .with_target(true)
        .try_init()
        .map_err(|err| CliError::Tracing(err.to_string()))
}
