// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::config::{SupervisorOptions, load_from_path};
use crate::errors::Result;
use crate::types::{GracePeriod, Signal, parse_signal};

/// Command-line arguments for `sentinelle`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sentinelle",
    version,
    about = "Run a program and restart it whenever watched files change.",
    long_about = None
)]
pub struct CliArgs {
    /// File to run. Must be executable unless `--bin` is given.
    #[arg(value_name = "ENTRYPOINT")]
    pub entrypoint: String,

    /// Arguments passed to the entrypoint.
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Binary used to run the entrypoint, e.g. "python -u".
    #[arg(long, value_name = "STRING")]
    pub bin: Option<String>,

    /// Additional path to watch. May be given more than once.
    #[arg(long, value_name = "PATH")]
    pub watch: Vec<String>,

    /// Signal sent to the process on restart or shutdown [default: SIGINT].
    #[arg(long, value_name = "SIGNAL", value_parser = parse_signal)]
    pub kill: Option<Signal>,

    /// Time the process gets to exit before it is killed, in milliseconds or
    /// as e.g. "4 seconds" [default: 4 seconds].
    #[arg(long, value_name = "DURATION")]
    pub grace_period: Option<String>,

    /// Optional TOML file with defaults for the flags above.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Only log warnings and errors.
    #[arg(long, short)]
    pub quiet: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `LOG_LEVEL` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl CliArgs {
    /// Supervisor options from the flags, with unset values taken from the
    /// config file when one was given.
    pub fn to_options(&self) -> Result<SupervisorOptions> {
        let options = SupervisorOptions {
            bin: self.bin.clone(),
            entry: self.entrypoint.clone(),
            entry_args: self.args.clone(),
            watch: self.watch.clone(),
            shutdown_grace_period: self.grace_period.as_deref().map(GracePeriod::from),
            shutdown_signal: self.kill,
            stdio: None,
        };

        match &self.config {
            Some(path) => {
                let file = load_from_path(path)?;
                Ok(options.with_file_defaults(&file.process))
            }
            None => Ok(options),
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

