// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `harvest`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "harvest",
    version,
    about = "Run browser-driven extraction jobs in isolated worker processes.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Harvest.toml` in the current working directory. If that file
    /// does not exist, built-in defaults are used.
    #[arg(long, value_name = "PATH", default_value = "Harvest.toml", global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `HARVEST_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Start a new extraction job and print its id.
    Create {
        /// Maximum number of work units to extract.
        ///
        /// Defaults to `[worker].default_limit`.
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Print the status record of a job as JSON.
    Status {
        #[arg(value_name = "JOB_ID")]
        job: String,
    },

    /// Print the current login token of a job.
    Token {
        #[arg(value_name = "JOB_ID")]
        job: String,
    },

    /// Print the raw result record of a job.
    ///
    /// This is a JSON array once the job is DONE, JSON lines before that.
    Result {
        #[arg(value_name = "JOB_ID")]
        job: String,
    },

    /// Poll a job until it finishes, printing every status change.
    Watch {
        #[arg(value_name = "JOB_ID")]
        job: String,
    },

    /// Run the worker for an existing job (started by `create`).
    #[command(hide = true)]
    Worker {
        #[arg(long, value_name = "JOB_ID")]
        job: String,

        #[arg(long, value_name = "N")]
        limit: usize,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Value as accepted by `--log-level`.
    pub fn as_arg(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
