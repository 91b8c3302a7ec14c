// src/exec/state.rs

use std::fmt;

/// Lifecycle state of a managed process.
///
/// ```text
/// STARTING -> STARTED -> STOPPING -> STOPPED | KILLED
///                     -> EXITED | KILLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
    /// Set right before the OS spawn call.
    Starting,
    /// Spawned, handlers attached.
    Started,
    /// A kill was issued and we are waiting for the process to go away.
    Stopping,
    /// Shut down (gracefully or not) after we asked it to, within the grace period.
    Stopped,
    /// Exited on its own, before anyone asked it to.
    Exited,
    /// Forcefully terminated.
    Killed,
}

impl ProcessState {
    pub fn is_closed(self) -> bool {
        matches!(
            self,
            ProcessState::Stopped | ProcessState::Exited | ProcessState::Killed
        )
    }

    /// Whether moving from `self` to `next` respects the lifecycle ordering.
    pub fn can_transition_to(self, next: ProcessState) -> bool {
        use ProcessState::*;

        match (self, next) {
            (Starting, Started) => true,
            (Started, Stopping | Exited | Killed) => true,
            (Stopping, Stopped | Killed) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessState::Starting => "STARTING",
            ProcessState::Started => "STARTED",
            ProcessState::Stopping => "STOPPING",
            ProcessState::Stopped => "STOPPED",
            ProcessState::Exited => "EXITED",
            ProcessState::Killed => "KILLED",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a runtime debugger possibly embedded in the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebuggerState {
    #[default]
    Disabled,
    Listening,
    Attached,
    /// User code finished but an attached debugger keeps the process alive.
    Hanging,
}

impl fmt::Display for DebuggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DebuggerState::Disabled => "DISABLED",
            DebuggerState::Listening => "LISTENING",
            DebuggerState::Attached => "ATTACHED",
            DebuggerState::Hanging => "HANGING",
        };
        f.write_str(s)
    }
}

/// Why we forcefully killed a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillReason {
    GracePeriodExpired,
    /// A restart was requested while the debugger had paused execution.
    PausedDebugger,
    HangingDebugger,
}

impl fmt::Display for KillReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KillReason::GracePeriodExpired => "GRACE_PERIOD_EXPIRED",
            KillReason::PausedDebugger => "PAUSED_DEBUGGER",
            KillReason::HangingDebugger => "HANGING_DEBUGGER",
        };
        f.write_str(s)
    }
}
