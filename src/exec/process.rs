// src/exec/process.rs

//! Lifecycle of one spawned OS process.
//!
//! A [`ManagedProcess`] is a cheap, cloneable handle. Its state lives behind a
//! mutex that is never held across an await point, and every state change is
//! mirrored into a `watch` channel so any number of tasks can wait for the
//! process to close.
//!
//! State is mutated only by:
//! - the event driver task (stderr chunks, errors, the close event),
//! - the grace-period timer,
//! - [`ManagedProcess::kill`].

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

use crate::errors::{Result, SentinelleError};
use crate::exec::backend::{
    CommandSpec, ExitInfo, ProcessEvent, ProcessHandle, ProcessOptions, ProcessSpawner,
    SpawnedProcess,
};
use crate::exec::debugger;
use crate::exec::diagnostics;
use crate::exec::exit::resolve_exit;
use crate::exec::state::{DebuggerState, KillReason, ProcessState};
use crate::types::{FORCE_SIGNAL, Signal};

/// Handle to a supervised child process.
#[derive(Clone)]
pub struct ManagedProcess {
    inner: Arc<Inner>,
}

struct Inner {
    pid: u32,
    command: CommandSpec,
    options: ProcessOptions,
    handle: Box<dyn ProcessHandle>,
    lifecycle: Mutex<Lifecycle>,
    state_tx: watch::Sender<ProcessState>,
}

#[derive(Debug)]
struct Lifecycle {
    state: ProcessState,
    debugger: DebuggerState,
    kill_reason: Option<KillReason>,
    grace_timer_armed: bool,
}

impl fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lifecycle = self.inner.lifecycle();
        f.debug_struct("ManagedProcess")
            .field("pid", &self.inner.pid)
            .field("command", &self.inner.command)
            .field("state", &lifecycle.state)
            .field("debugger", &lifecycle.debugger)
            .field("kill_reason", &lifecycle.kill_reason)
            .finish()
    }
}

impl ManagedProcess {
    /// Spawn `command` and start tracking it.
    ///
    /// Invariant violations detected later by the event driver (an exit the
    /// close handler has no rule for) are sent to `faults`.
    pub fn spawn(
        command: CommandSpec,
        options: ProcessOptions,
        spawner: &dyn ProcessSpawner,
        faults: mpsc::UnboundedSender<SentinelleError>,
    ) -> Result<Self> {
        trace!(%command, "Set process state to STARTING.");
        let SpawnedProcess { handle, events } = spawner.spawn(&command, &options.stdio)?;

        let (state_tx, _) = watch::channel(ProcessState::Starting);
        let inner = Arc::new(Inner {
            pid: handle.pid(),
            command,
            options,
            handle,
            lifecycle: Mutex::new(Lifecycle {
                state: ProcessState::Starting,
                debugger: DebuggerState::Disabled,
                kill_reason: None,
                grace_timer_armed: false,
            }),
            state_tx,
        });

        {
            let mut lifecycle = inner.lifecycle();
            inner.set_state(&mut lifecycle, ProcessState::Started);
        }

        // Started first: the driver may see the close event right away.
        tokio::spawn(drive(Arc::clone(&inner), events, faults));

        Ok(Self { inner })
    }

    pub fn pid(&self) -> u32 {
        self.inner.pid
    }

    pub fn command(&self) -> &CommandSpec {
        &self.inner.command
    }

    pub fn state(&self) -> ProcessState {
        self.inner.lifecycle().state
    }

    pub fn debugger_state(&self) -> DebuggerState {
        self.inner.lifecycle().debugger
    }

    pub fn kill_reason(&self) -> Option<KillReason> {
        self.inner.lifecycle().kill_reason
    }

    /// True once the process is STOPPED, EXITED or KILLED.
    pub fn is_closed(&self) -> bool {
        self.state().is_closed()
    }

    /// Resolves once the process reaches a terminal state.
    ///
    /// Safe to await from any number of tasks at once; they all wake together.
    pub fn await_closed(&self) -> impl Future<Output = ()> + Send + 'static + use<> {
        let mut rx = self.inner.state_tx.subscribe();
        async move {
            // An error means the process and its driver are gone: nothing
            // left to wait for.
            let _ = rx.wait_for(|state| state.is_closed()).await;
        }
    }

    /// Ask the process to terminate.
    ///
    /// The state moves to STOPPING and `signal` (default: the configured
    /// shutdown signal) is delivered before this returns. Unless `signal` is
    /// already the force signal, a timer is armed that escalates to a forced
    /// kill once the grace period expires. The returned future resolves when
    /// the process has closed.
    ///
    /// On an already closed process this does nothing and resolves
    /// immediately.
    pub fn kill(
        &self,
        signal: Option<Signal>,
    ) -> impl Future<Output = ()> + Send + 'static + use<> {
        let signal = signal.unwrap_or(self.inner.options.shutdown_signal);
        {
            let mut lifecycle = self.inner.lifecycle();
            Inner::kill_locked(&self.inner, &mut lifecycle, signal);
        }
        self.await_closed()
    }
}

impl Inner {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `next` if the lifecycle allows it. Returns whether the state
    /// is now `next`.
    fn set_state(&self, lifecycle: &mut Lifecycle, next: ProcessState) -> bool {
        if lifecycle.state == next {
            return true;
        }
        if !lifecycle.state.can_transition_to(next) {
            debug!(
                pid = self.pid,
                from = %lifecycle.state,
                to = %next,
                "ignoring out-of-order state transition"
            );
            return false;
        }

        lifecycle.state = next;
        self.state_tx.send_replace(next);
        trace!(pid = self.pid, "Set process state to {next}.");
        true
    }

    fn kill_locked(this: &Arc<Self>, lifecycle: &mut Lifecycle, signal: Signal) {
        if lifecycle.state.is_closed() {
            trace!(pid = this.pid, state = %lifecycle.state, "process already closed; not signalling");
            return;
        }

        this.set_state(lifecycle, ProcessState::Stopping);

        trace!(pid = this.pid, %signal, "Sending signal to process.");
        if let Err(err) = this.handle.signal(signal) {
            diagnostics::report_child_error(&err);
        }

        if signal != FORCE_SIGNAL && !lifecycle.grace_timer_armed {
            lifecycle.grace_timer_armed = true;
            Self::schedule_force_kill(this);
        }
    }

    /// The timer is never cancelled; the callback re-checks whether the
    /// process has closed in the meantime.
    fn schedule_force_kill(this: &Arc<Self>) {
        let inner = Arc::clone(this);
        let grace_period = this.options.grace_period;

        tokio::spawn(async move {
            tokio::time::sleep(grace_period).await;
            inner.on_grace_period_expired();
        });
    }

    fn on_grace_period_expired(self: &Arc<Self>) {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state.is_closed() {
            return;
        }
        if self.handle.has_exited() {
            // Exited in time; the close event is still on its way.
            debug!(pid = self.pid, "grace period expired after process exit");
            return;
        }

        // A paused debugger will never let the process act on the shutdown
        // signal.
        let reason = if lifecycle.debugger == DebuggerState::Attached {
            debug!(pid = self.pid, "grace period expired with a debugger attached");
            KillReason::PausedDebugger
        } else {
            warn!(
                pid = self.pid,
                "Grace period expired, sending {FORCE_SIGNAL} to process."
            );
            KillReason::GracePeriodExpired
        };

        lifecycle.kill_reason = Some(reason);
        Self::kill_locked(self, &mut lifecycle, FORCE_SIGNAL);
    }

    fn on_stderr(self: &Arc<Self>, chunk: &str) {
        for found in debugger::scan_chunk(chunk) {
            let mut lifecycle = self.lifecycle();
            lifecycle.debugger = found;
            debug!(pid = self.pid, "Set debugger state to {found}.");

            // The runtime prints this only after user code has finished, so
            // the process is done as far as the user is concerned.
            if found == DebuggerState::Hanging && !lifecycle.state.is_closed() {
                lifecycle.kill_reason = Some(KillReason::HangingDebugger);
                Self::kill_locked(self, &mut lifecycle, FORCE_SIGNAL);
            }
        }
    }

    fn on_close(&self, exit: ExitInfo) -> Result<()> {
        let mut lifecycle = self.lifecycle();
        let outcome = resolve_exit(exit, lifecycle.kill_reason, lifecycle.state)?;

        if !self.set_state(&mut lifecycle, outcome.state()) {
            return Err(SentinelleError::UnexpectedExit {
                code: exit.code,
                signal: exit.signal,
                state: lifecycle.state,
            });
        }

        if outcome.is_failure() {
            error!(pid = self.pid, "{}", outcome.message());
        } else {
            info!(pid = self.pid, "{}", outcome.message());
        }
        Ok(())
    }
}

/// Consume process events until the close event arrives.
async fn drive(
    inner: Arc<Inner>,
    mut events: mpsc::UnboundedReceiver<ProcessEvent>,
    faults: mpsc::UnboundedSender<SentinelleError>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ProcessEvent::Stderr(chunk) => inner.on_stderr(&chunk),
            ProcessEvent::Error(err) => diagnostics::report_child_error(&err),
            ProcessEvent::Closed(exit) => {
                if let Err(err) = inner.on_close(exit) {
                    error!(pid = inner.pid, error = %err, "process lifecycle invariant violated");
                    let _ = faults.send(err);
                }
                return;
            }
        }
    }

    let err = SentinelleError::EventStreamClosed { pid: inner.pid };
    error!(pid = inner.pid, error = %err, "process lifecycle invariant violated");
    let _ = faults.send(err);
}
