// src/exec/diagnostics.rs

//! User-facing reporting of child process errors.

use std::error::Error as _;
use std::io;

use nix::errno::Errno;
use tracing::{debug, error, trace};

use crate::errors::SentinelleError;

pub const SHEBANG_HINT: &str = "Did you remember to set a shebang in your entrypoint?";
pub const EXECUTABLE_HINT: &str =
    "Did you remember to set the executable flag on your entrypoint?";

/// Errors we caused ourselves and already report through state transitions.
///
/// Signalling a process that has already exited fails with `ESRCH`; the
/// close event tells the real story.
pub fn is_expected_noise(err: &SentinelleError) -> bool {
    matches!(
        err,
        SentinelleError::Signal {
            source: Errno::ESRCH,
            ..
        }
    )
}

/// An actionable hint for the common ways an entrypoint fails to execute.
pub fn hint_for(err: &SentinelleError) -> Option<&'static str> {
    let SentinelleError::Spawn { source, .. } = err else {
        return None;
    };

    // ENOEXEC: no interpreter directive. ENOENT: the directive names a
    // missing interpreter.
    if source.raw_os_error() == Some(Errno::ENOEXEC as i32)
        || source.kind() == io::ErrorKind::NotFound
    {
        return Some(SHEBANG_HINT);
    }
    if source.kind() == io::ErrorKind::PermissionDenied {
        return Some(EXECUTABLE_HINT);
    }
    None
}

/// Log a child process error, unless it is expected noise.
pub fn report_child_error(err: &SentinelleError) {
    if is_expected_noise(err) {
        trace!(error = %err, "ignoring expected child process error");
        return;
    }

    error!("Child process error: {err}");
    if let Some(source) = err.source() {
        debug!(detail = ?source, "child process error detail");
    }

    if let Some(hint) = hint_for(err) {
        error!(target: "hint", "{hint}");
    }
}
