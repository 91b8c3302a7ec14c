// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use nix::sys::signal::Signal;
use thiserror::Error;

use crate::exec::ProcessState;

#[derive(Error, Debug)]
pub enum SentinelleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("The file \"{}\" could not be found.", .0.display())]
    EntryNotFound(PathBuf),

    #[error("The file \"{}\" could not be read; permission denied.", .0.display())]
    EntryUnreadable(PathBuf),

    #[error("The binary \"{0}\" was not found on your system.")]
    BinaryNotFound(String),

    #[error("The file \"{}\" is not executable; set its executable flag or pass --bin.", .0.display())]
    NotExecutable(PathBuf),

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to send {signal} to process {pid}: {source}")]
    Signal {
        pid: u32,
        signal: Signal,
        #[source]
        source: nix::Error,
    },

    /// The close handler saw a combination it has no rule for.
    #[error(
        "unexpected code path in close handler (exit code: {code:?}; signal: {signal:?}; state: {state})"
    )]
    UnexpectedExit {
        code: Option<i32>,
        signal: Option<Signal>,
        state: ProcessState,
    },

    #[error("event stream of process {pid} ended before it closed")]
    EventStreamClosed { pid: u32 },

    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SentinelleError {
    /// True for errors that mean the lifecycle bookkeeping itself is broken.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            SentinelleError::UnexpectedExit { .. } | SentinelleError::EventStreamClosed { .. }
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SentinelleError>;
