// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] abstracts spawning behind [`ProcessSpawner`]; production uses
//!   [`TokioSpawner`], tests substitute a fake.
//! - [`process`] holds [`ManagedProcess`], the per-process state machine.
//! - [`exit`] decides the terminal state from a close event.
//! - [`debugger`] recognises debugger messages on the child's stderr.
//! - [`diagnostics`] reports child errors with hints for common mistakes.

pub mod backend;
pub mod debugger;
pub mod diagnostics;
pub mod exit;
pub mod process;
pub mod state;

pub use backend::{
    CommandSpec, ExitInfo, ProcessEvent, ProcessHandle, ProcessOptions, ProcessSpawner,
    SpawnedProcess, TokioSpawner,
};
pub use debugger::scan_chunk;
pub use exit::{ExitOutcome, resolve_exit};
pub use process::ManagedProcess;
pub use state::{DebuggerState, KillReason, ProcessState};
