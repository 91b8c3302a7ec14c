// src/exec/exit.rs

//! Close-event decision table.
//!
//! Given how a process exited, why (if at all) we force-killed it, and the
//! state it was in, decide its terminal state. Rules are checked in order and
//! the first match wins:
//!
//! 1. kill reason `GRACE_PERIOD_EXPIRED`            -> KILLED
//! 2. terminated by the force signal                 -> KILLED
//! 3. kill reason `PAUSED_DEBUGGER`                  -> KILLED
//! 4. kill reason `HANGING_DEBUGGER`                 -> KILLED
//! 5. non-zero code, no signal: STOPPING -> STOPPED, STARTED -> EXITED
//! 6. zero or absent code:      STOPPING -> STOPPED, STARTED -> EXITED
//!
//! Anything else is an invariant violation and is reported as an error.

use crate::errors::{Result, SentinelleError};
use crate::exec::backend::ExitInfo;
use crate::exec::state::{KillReason, ProcessState};
use crate::types::FORCE_SIGNAL;

/// Which rule decided the terminal state. Drives the user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    GracePeriodExpired,
    ForceKilled,
    PausedDebugger,
    HangingDebugger,
    CrashedWhileStopping { code: i32 },
    Crashed { code: i32 },
    ShutDownGracefully,
    ExitedCleanly,
}

impl ExitOutcome {
    pub fn state(self) -> ProcessState {
        match self {
            ExitOutcome::GracePeriodExpired
            | ExitOutcome::ForceKilled
            | ExitOutcome::PausedDebugger
            | ExitOutcome::HangingDebugger => ProcessState::Killed,
            ExitOutcome::CrashedWhileStopping { .. } | ExitOutcome::ShutDownGracefully => {
                ProcessState::Stopped
            }
            ExitOutcome::Crashed { .. } | ExitOutcome::ExitedCleanly => ProcessState::Exited,
        }
    }

    /// Whether this outcome should be reported at error level.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            ExitOutcome::GracePeriodExpired
                | ExitOutcome::CrashedWhileStopping { .. }
                | ExitOutcome::Crashed { .. }
        )
    }

    pub fn message(self) -> String {
        match self {
            ExitOutcome::GracePeriodExpired => {
                "Process failed to shut down in time and was killed.".to_string()
            }
            ExitOutcome::ForceKilled => "Process was killed.".to_string(),
            ExitOutcome::PausedDebugger => {
                "Detected paused debugger; process was killed.".to_string()
            }
            ExitOutcome::HangingDebugger => {
                "Detected hanging debugger; process was killed.".to_string()
            }
            ExitOutcome::CrashedWhileStopping { code } => {
                format!("Process crashed while shutting down. (Code: {code})")
            }
            ExitOutcome::Crashed { code } => format!("Process crashed. (Code: {code})"),
            ExitOutcome::ShutDownGracefully => "Process shut down gracefully.".to_string(),
            ExitOutcome::ExitedCleanly => "Process exited cleanly.".to_string(),
        }
    }
}

/// Apply the decision table. See the module docs for the rule order.
pub fn resolve_exit(
    exit: ExitInfo,
    kill_reason: Option<KillReason>,
    state: ProcessState,
) -> Result<ExitOutcome> {
    if kill_reason == Some(KillReason::GracePeriodExpired) {
        return Ok(ExitOutcome::GracePeriodExpired);
    }

    if exit.signal == Some(FORCE_SIGNAL) {
        return Ok(ExitOutcome::ForceKilled);
    }

    match kill_reason {
        Some(KillReason::PausedDebugger) => return Ok(ExitOutcome::PausedDebugger),
        Some(KillReason::HangingDebugger) => return Ok(ExitOutcome::HangingDebugger),
        _ => {}
    }

    match (exit.code, exit.signal, state) {
        (Some(code), None, ProcessState::Stopping) if code != 0 => {
            return Ok(ExitOutcome::CrashedWhileStopping { code });
        }
        (Some(code), None, ProcessState::Started) if code != 0 => {
            return Ok(ExitOutcome::Crashed { code });
        }
        _ => {}
    }

    if matches!(exit.code, Some(0) | None) {
        match state {
            ProcessState::Stopping => return Ok(ExitOutcome::ShutDownGracefully),
            ProcessState::Started => return Ok(ExitOutcome::ExitedCleanly),
            _ => {}
        }
    }

    Err(SentinelleError::UnexpectedExit {
        code: exit.code,
        signal: exit.signal,
        state,
    })
}
