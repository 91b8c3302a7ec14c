// src/engine/supervisor.rs

//! The supervisor: one watcher subscription, at most one live process.
//!
//! Restarts are debounced by state, not by time. A change event is ignored
//! while the current process is STOPPING or while a start/restart has not yet
//! stored its new process. Every state check and the transition it leads to
//! happen under one short lock, so a burst of change events collapses into a
//! single restart.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use crate::config::{SupervisorConfig, SupervisorOptions};
use crate::errors::{Result, SentinelleError};
use crate::exec::{ManagedProcess, ProcessSpawner, ProcessState, TokioSpawner, diagnostics};
use crate::fs::RealFileSystem;
use crate::types::{FORCE_SIGNAL, Signal};
use crate::watch::{NotifyBackend, WatchBackend, WatchEvent, WatchSubscription};

/// The capabilities a supervisor drives. Swapped for fakes in tests.
#[derive(Clone)]
pub struct Backends {
    pub spawner: Arc<dyn ProcessSpawner>,
    pub watcher: Arc<dyn WatchBackend>,
}

impl Backends {
    pub fn new(spawner: Arc<dyn ProcessSpawner>, watcher: Arc<dyn WatchBackend>) -> Self {
        Self { spawner, watcher }
    }

    /// `tokio::process` and `notify`.
    pub fn real() -> Self {
        Self::new(Arc::new(TokioSpawner), Arc::new(NotifyBackend))
    }
}

impl fmt::Debug for Backends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}

/// Cheap, cloneable handle to a supervisor.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

struct Inner {
    config: SupervisorConfig,
    backends: Backends,
    state: Mutex<State>,
    faults_tx: mpsc::UnboundedSender<SentinelleError>,
    faults_rx: Mutex<Option<mpsc::UnboundedReceiver<SentinelleError>>>,
}

#[derive(Default)]
struct State {
    current: Option<ManagedProcess>,
    watcher: Option<Box<dyn WatchSubscription>>,
    /// A start or restart is running and has not stored its process yet.
    in_flight: bool,
    /// Bumped by every `stop()`. Transitions begun before a stop are abandoned.
    epoch: u64,
}

/// Marks a transition as in flight until dropped.
struct InFlight {
    inner: Arc<Inner>,
    epoch: u64,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        // A transition begun after a stop owns the flag now.
        let mut state = self.inner.state();
        if state.epoch == self.epoch {
            state.in_flight = false;
        }
    }
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state();
        f.debug_struct("Supervisor")
            .field("command", self.inner.config.command())
            .field("watch_paths", &self.inner.config.watch_paths())
            .field("current", &state.current)
            .field("watching", &state.watcher.is_some())
            .field("in_flight", &state.in_flight)
            .finish()
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, backends: Backends) -> Self {
        let (faults_tx, faults_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                config,
                backends,
                state: Mutex::new(State::default()),
                faults_tx,
                faults_rx: Mutex::new(Some(faults_rx)),
            }),
        }
    }

    /// Validate `options` against the real filesystem and build a supervisor.
    pub fn from_options(options: SupervisorOptions, backends: Backends) -> Result<Self> {
        let config = SupervisorConfig::from_options(options, &RealFileSystem)?;
        Ok(Self::new(config, backends))
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    pub fn watch_paths(&self) -> &[PathBuf] {
        self.inner.config.watch_paths()
    }

    /// State of the current process, if there is one.
    pub fn current_state(&self) -> Option<ProcessState> {
        self.current_process().map(|process| process.state())
    }

    pub fn current_process(&self) -> Option<ManagedProcess> {
        self.inner.state().current.clone()
    }

    pub fn is_watching(&self) -> bool {
        self.inner.state().watcher.is_some()
    }

    /// Receiver for lifecycle invariant violations. Can be taken once.
    pub fn take_fault_receiver(&self) -> Option<mpsc::UnboundedReceiver<SentinelleError>> {
        self.inner
            .faults_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Start watching (once) and spawn a process.
    ///
    /// If the previous process is still shutting down, waits for it to close
    /// first. A spawn failure is logged and leaves no current process; the
    /// next change event retries. Only a watcher failure is returned.
    pub async fn start(&self) -> Result<()> {
        let guard = {
            let mut state = self.inner.state();
            self.begin_transition(&mut state)
        };
        self.spawn_next(guard).await
    }

    /// Stop the current process (if it is still running) and start a new one.
    ///
    /// The stop is initiated before this returns; the returned future finishes
    /// the restart. Does nothing when there is no current process.
    pub fn restart(
        &self,
        signal: Option<Signal>,
    ) -> impl Future<Output = Result<()>> + Send + 'static + use<> {
        let prepared = {
            let mut state = self.inner.state();
            let current = state.current.clone();
            current.map(|process| (self.begin_transition(&mut state), process))
        };
        let prepared = prepared.map(|(guard, process)| (guard, stop_process(&process, signal)));

        let this = self.clone();
        async move {
            let Some((guard, stopping)) = prepared else {
                trace!("no current process; nothing to restart");
                return Ok(());
            };
            stopping.await;
            this.spawn_next(guard).await
        }
    }

    /// Stop watching and stop the current process.
    ///
    /// Does nothing when there is no current process. A later [`start`]
    /// re-initialises the watcher.
    ///
    /// [`start`]: Supervisor::start
    pub async fn stop(&self, signal: Option<Signal>) {
        let (process, watcher) = {
            let mut state = self.inner.state();
            let Some(process) = state.current.clone() else {
                trace!("no current process; nothing to stop");
                return;
            };
            state.epoch += 1;
            (process, state.watcher.take())
        };

        if let Some(watcher) = watcher {
            watcher.close();
            debug!("stopped watching");
        }

        stop_process(&process, signal).await;
    }

    /// React to a filesystem change.
    pub fn on_change(&self) {
        let mut state = self.inner.state();

        if state.watcher.is_none() {
            trace!("not watching; ignoring change");
            return;
        }
        if state.in_flight {
            debug!("restart already in flight; ignoring change");
            return;
        }

        let current = state.current.clone();
        match current {
            None => {
                let guard = self.begin_transition(&mut state);
                drop(state);

                let this = self.clone();
                tokio::spawn(async move {
                    if let Err(err) = this.spawn_next(guard).await {
                        debug!(error = %err, "background start failed");
                    }
                });
            }
            Some(process) if process.state() == ProcessState::Stopping => {
                debug!(pid = process.pid(), "process is stopping; ignoring change");
            }
            Some(_) => {
                drop(state);

                let restarting = self.restart(None);
                tokio::spawn(async move {
                    if let Err(err) = restarting.await {
                        debug!(error = %err, "background restart failed");
                    }
                });
            }
        }
    }

    fn begin_transition(&self, state: &mut State) -> InFlight {
        state.in_flight = true;
        InFlight {
            inner: Arc::clone(&self.inner),
            epoch: state.epoch,
        }
    }

    fn is_stale(&self, guard: &InFlight) -> bool {
        self.inner.state().epoch != guard.epoch
    }

    async fn spawn_next(&self, guard: InFlight) -> Result<()> {
        if self.is_stale(&guard) {
            debug!("supervisor stopped; abandoning start");
            return Ok(());
        }

        self.ensure_watching()?;

        if let Some(previous) = self.current_process() {
            if !previous.is_closed() {
                debug!(pid = previous.pid(), "waiting for previous process to close");
                previous.await_closed().await;
            }
        }

        let mut state = self.inner.state();
        if state.epoch != guard.epoch {
            drop(state);
            debug!("supervisor stopped; abandoning start");
            return Ok(());
        }

        let command = self.inner.config.command().clone();
        info!(%command, "Starting {}", command.program);

        state.current = match ManagedProcess::spawn(
            command,
            *self.inner.config.process(),
            self.inner.backends.spawner.as_ref(),
            self.inner.faults_tx.clone(),
        ) {
            Ok(process) => {
                debug!(pid = process.pid(), "process started");
                Some(process)
            }
            Err(err) => {
                diagnostics::report_child_error(&err);
                None
            }
        };
        drop(state);
        drop(guard);

        Ok(())
    }

    fn ensure_watching(&self) -> Result<()> {
        let mut state = self.inner.state();
        if state.watcher.is_some() {
            return Ok(());
        }

        let paths = self.inner.config.watch_paths();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let subscription = self.inner.backends.watcher.watch(paths, events_tx)?;

        for path in paths {
            if path.is_dir() {
                info!(path = %path.display(), "Watching directory {}", path.display());
            } else {
                info!(path = %path.display(), "Watching file {}", path.display());
            }
        }

        state.watcher = Some(subscription);
        drop(state);

        tokio::spawn(self.clone().consume_watch_events(events_rx));
        Ok(())
    }

    /// Runs until the subscription that feeds `events` is closed.
    async fn consume_watch_events(self, mut events: mpsc::UnboundedReceiver<WatchEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                WatchEvent::Changed(paths) => {
                    debug!(?paths, "change detected");
                    self.on_change();
                }
                WatchEvent::Error(err) => {
                    error!("Watcher error: {err}");
                    debug!(detail = ?err, "watcher error detail");
                }
            }
        }
        trace!("watch event stream ended");
    }
}

/// Begin stopping `process`; the future resolves once it has closed.
fn stop_process(
    process: &ManagedProcess,
    signal: Option<Signal>,
) -> impl Future<Output = ()> + Send + 'static + use<> {
    if !process.is_closed() {
        if signal == Some(FORCE_SIGNAL) {
            info!(pid = process.pid(), "Forcefully stopping process...");
        } else {
            info!(pid = process.pid(), "Stopping process...");
        }
    }
    process.kill(signal)
}
