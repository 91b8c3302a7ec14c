// src/engine/shutdown.rs

//! Termination signal handling.
//!
//! The first termination signal starts a graceful [`Supervisor::stop`]. If the
//! same signal arrives again before that finishes, the process is killed with
//! the force signal and the caller is told to re-raise the signal so the OS
//! default terminates us.

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::Supervisor;
use crate::errors::Result;
use crate::types::{FORCE_SIGNAL, Signal};

/// Signals that ask the supervisor to shut down.
pub const TERMINATION_SIGNALS: [Signal; 4] = [
    Signal::SIGINT,
    Signal::SIGTERM,
    Signal::SIGQUIT,
    Signal::SIGHUP,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The supervisor stopped after the first signal.
    Graceful(Signal),
    /// The signal was delivered twice; the process was force-killed.
    Forced(Signal),
}

#[derive(Debug)]
pub struct ShutdownCoordinator {
    supervisor: Supervisor,
    signals: mpsc::UnboundedReceiver<Signal>,
}

impl ShutdownCoordinator {
    pub fn new(supervisor: Supervisor, signals: mpsc::UnboundedReceiver<Signal>) -> Self {
        Self {
            supervisor,
            signals,
        }
    }

    /// Wait for a termination signal and shut the supervisor down.
    ///
    /// Returns `None` if the signal source closes before any signal arrives.
    pub async fn run(self) -> Option<ShutdownOutcome> {
        let Self {
            supervisor,
            mut signals,
        } = self;

        let first = signals.recv().await?;
        info!(signal = %first, "Received {first}, shutting down...");

        let stopping = supervisor.stop(None);
        tokio::pin!(stopping);

        loop {
            tokio::select! {
                () = &mut stopping => return Some(ShutdownOutcome::Graceful(first)),
                next = signals.recv() => match next {
                    Some(again) if again == first => {
                        warn!(signal = %again, "Received {again} again, forcefully stopping...");
                        supervisor.stop(Some(FORCE_SIGNAL)).await;
                        return Some(ShutdownOutcome::Forced(first));
                    }
                    Some(other) => {
                        debug!(signal = %other, "ignoring signal while shutting down");
                    }
                    None => {
                        (&mut stopping).await;
                        return Some(ShutdownOutcome::Graceful(first));
                    }
                },
            }
        }
    }
}

/// Forward [`TERMINATION_SIGNALS`] delivered to this process into a channel.
///
/// Must be called from within a Tokio runtime.
pub fn listen_os_signals() -> Result<mpsc::UnboundedReceiver<Signal>> {
    let (tx, rx) = mpsc::unbounded_channel();

    for sig in TERMINATION_SIGNALS {
        let mut stream = signal(SignalKind::from_raw(sig as i32))?;
        let tx = tx.clone();

        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                if tx.send(sig).is_err() {
                    break;
                }
            }
        });
    }

    Ok(rx)
}

/// Restore the default disposition of `sig` and raise it against ourselves.
pub fn reraise(sig: Signal) -> ! {
    use nix::sys::signal::{SigHandler, raise, signal as set_handler};

    debug!(signal = %sig, "re-raising signal with default disposition");

    // SAFETY: SIG_DFL installs no handler code, so no async-signal-safety
    // requirements apply.
    let _ = unsafe { set_handler(sig, SigHandler::SigDfl) };
    let _ = raise(sig);

    std::process::exit(128 + sig as i32)
}
