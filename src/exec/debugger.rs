// src/exec/debugger.rs

//! Detect runtime debugger activity from a child's stderr output.

use std::sync::LazyLock;

use regex::Regex;

use crate::exec::state::DebuggerState;

const LISTENING_MARKER: &str = "Debugger listening on";
const ATTACHED_MARKER: &str = "Debugger attached";

// Printed once user code has finished but an attached debugger keeps the
// process alive.
static HANGING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)waiting for the debugger to disconnect").expect("valid regex")
});

/// Debugger state transitions found in one chunk of stderr, in the order
/// they should be applied.
pub fn scan_chunk(chunk: &str) -> Vec<DebuggerState> {
    let mut found = Vec::new();

    if chunk.contains(LISTENING_MARKER) {
        found.push(DebuggerState::Listening);
    }
    if chunk.contains(ATTACHED_MARKER) {
        found.push(DebuggerState::Attached);
    }
    if HANGING_PATTERN.is_match(chunk) {
        found.push(DebuggerState::Hanging);
    }

    found
}
