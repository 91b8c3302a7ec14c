// src/engine/mod.rs

//! Orchestration engine for sentinelle.
//!
//! - [`supervisor`] owns the watcher subscription and the single live
//!   [`ManagedProcess`](crate::exec::ManagedProcess), and turns change events
//!   into restarts.
//! - [`shutdown`] maps termination signals onto an orderly supervisor stop,
//!   with a forced fallback when a signal is repeated.

pub mod shutdown;
pub mod supervisor;

pub use shutdown::{ShutdownCoordinator, ShutdownOutcome, TERMINATION_SIGNALS};
pub use supervisor::{Backends, Supervisor};
