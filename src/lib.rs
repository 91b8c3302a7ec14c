// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod types;
pub mod watch;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::engine::{Backends, ShutdownCoordinator, ShutdownOutcome, Supervisor, shutdown};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - option parsing and validation (CLI flags over the optional config file)
/// - the supervisor and its initial start
/// - termination signal handling
/// - lifecycle invariant violations, which end the run with an error
pub async fn run(args: CliArgs) -> Result<()> {
    let options = args.to_options()?;
    debug!(?options, "resolved options");

    let supervisor = Supervisor::from_options(options, Backends::real())?;
    let mut faults = supervisor
        .take_fault_receiver()
        .context("fault receiver already taken")?;

    let signals = shutdown::listen_os_signals()?;
    let coordinator = ShutdownCoordinator::new(supervisor.clone(), signals);

    supervisor.start().await?;

    tokio::select! {
        outcome = coordinator.run() => {
            match outcome {
                Some(ShutdownOutcome::Forced(sig)) => shutdown::reraise(sig),
                Some(ShutdownOutcome::Graceful(sig)) => info!(signal = %sig, "shut down"),
                None => debug!("signal listeners closed"),
            }
            Ok(())
        }
        Some(fault) = faults.recv() => Err(fault.into()),
    }
}
