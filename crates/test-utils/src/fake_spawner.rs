use std::io;
use std::sync::{Arc, Mutex};

use nix::errno::Errno;
use tokio::sync::mpsc;
use sentinelle::errors::{Result, SentinelleError};
use sentinelle::exec::{
    CommandSpec, ExitInfo, ProcessEvent, ProcessHandle, ProcessSpawner, SpawnedProcess,
};
use sentinelle::types::{FORCE_SIGNAL, Signal, StdioConfig};

/// How a fake process reacts to a signal other than the force signal.
///
/// The force signal always terminates it, reported as killed by that signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalResponse {
    /// Record the signal and keep running.
    Ignore,
    /// Exit with this code.
    ExitWithCode(i32),
    /// Die from the signal.
    TerminateBySignal,
}

/// A fake spawner that:
/// - records every command it was asked to spawn
/// - hands out [`FakeProcess`] controls so tests can script stderr, exits
///   and signal delivery.
#[derive(Clone)]
pub struct FakeSpawner {
    state: Arc<Mutex<SpawnerState>>,
}

struct SpawnerState {
    next_pid: u32,
    response: SignalResponse,
    fail_next: Option<i32>,
    spawned: Vec<FakeProcess>,
}

impl FakeSpawner {
    /// Processes exit with code 0 on the shutdown signal.
    pub fn new() -> Self {
        Self::with_response(SignalResponse::ExitWithCode(0))
    }

    pub fn with_response(response: SignalResponse) -> Self {
        Self {
            state: Arc::new(Mutex::new(SpawnerState {
                next_pid: 1000,
                response,
                fail_next: None,
                spawned: Vec::new(),
            })),
        }
    }

    /// Change how processes spawned from now on react to signals.
    pub fn set_response(&self, response: SignalResponse) {
        self.state.lock().unwrap().response = response;
    }

    /// Make the next spawn fail with the given OS error number.
    pub fn fail_next_spawn(&self, errno: Errno) {
        self.state.lock().unwrap().fail_next = Some(errno as i32);
    }

    pub fn spawn_count(&self) -> usize {
        self.state.lock().unwrap().spawned.len()
    }

    pub fn spawned(&self) -> Vec<FakeProcess> {
        self.state.lock().unwrap().spawned.clone()
    }

    pub fn last(&self) -> Option<FakeProcess> {
        self.state.lock().unwrap().spawned.last().cloned()
    }

    pub fn commands(&self) -> Vec<CommandSpec> {
        self.spawned().into_iter().map(|p| p.command).collect()
    }

    /// Wait until at least `n` processes have been spawned.
    pub async fn wait_for_spawns(&self, n: usize) {
        while self.spawn_count() < n {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
    }
}

impl Default for FakeSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSpawner for FakeSpawner {
    fn spawn(&self, command: &CommandSpec, stdio: &StdioConfig) -> Result<SpawnedProcess> {
        let mut state = self.state.lock().unwrap();

        if let Some(errno) = state.fail_next.take() {
            return Err(SentinelleError::Spawn {
                command: command.to_string(),
                source: io::Error::from_raw_os_error(errno),
            });
        }

        let pid = state.next_pid;
        state.next_pid += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        let process = FakeProcess {
            pid,
            command: command.clone(),
            stdio: *stdio,
            response: state.response,
            shared: Arc::new(Mutex::new(FakeShared {
                signals: Vec::new(),
                events: Some(tx),
                closed: false,
                reaped: false,
            })),
        };
        state.spawned.push(process.clone());

        Ok(SpawnedProcess {
            handle: Box::new(process),
            events: rx,
        })
    }
}

/// Test-side control of one fake process.
#[derive(Clone)]
pub struct FakeProcess {
    pid: u32,
    command: CommandSpec,
    stdio: StdioConfig,
    response: SignalResponse,
    shared: Arc<Mutex<FakeShared>>,
}

struct FakeShared {
    signals: Vec<Signal>,
    events: Option<mpsc::UnboundedSender<ProcessEvent>>,
    closed: bool,
    /// Exited, but the close event has not been sent yet.
    reaped: bool,
}

impl FakeProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn command(&self) -> &CommandSpec {
        &self.command
    }

    pub fn stdio(&self) -> StdioConfig {
        self.stdio
    }

    /// Signals delivered so far, in order.
    pub fn signals(&self) -> Vec<Signal> {
        self.shared.lock().unwrap().signals.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().unwrap().closed
    }

    /// Emit a chunk of stderr output.
    pub fn stderr(&self, text: &str) {
        self.send(ProcessEvent::Stderr(text.to_string()));
    }

    /// Emit an error event.
    pub fn error(&self, err: SentinelleError) {
        self.send(ProcessEvent::Error(err));
    }

    /// Exit on its own with `code`.
    pub fn exit(&self, code: i32) {
        self.close(ExitInfo::code(code));
    }

    /// Emit the close event. Later calls do nothing.
    pub fn close(&self, exit: ExitInfo) {
        let mut shared = self.shared.lock().unwrap();
        close_locked(&mut shared, exit);
    }

    /// Exit without emitting the close event yet, like a real child whose
    /// stderr is still draining. Finish with [`close`](Self::close).
    pub fn reap(&self) {
        self.shared.lock().unwrap().reaped = true;
    }

    /// Drop the event stream without a close event.
    pub fn vanish(&self) {
        let mut shared = self.shared.lock().unwrap();
        shared.closed = true;
        shared.events = None;
    }

    fn send(&self, event: ProcessEvent) {
        let shared = self.shared.lock().unwrap();
        if let Some(tx) = &shared.events {
            let _ = tx.send(event);
        }
    }
}

fn close_locked(shared: &mut FakeShared, exit: ExitInfo) {
    if shared.closed {
        return;
    }
    shared.closed = true;
    if let Some(tx) = shared.events.take() {
        let _ = tx.send(ProcessEvent::Closed(exit));
    }
}

impl ProcessHandle for FakeProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn signal(&self, signal: Signal) -> Result<()> {
        let mut shared = self.shared.lock().unwrap();
        if shared.closed || shared.reaped {
            return Err(SentinelleError::Signal {
                pid: self.pid,
                signal,
                source: Errno::ESRCH,
            });
        }
        shared.signals.push(signal);

        if signal == FORCE_SIGNAL {
            close_locked(&mut shared, ExitInfo::signal(signal));
            return Ok(());
        }

        match self.response {
            SignalResponse::Ignore => {}
            SignalResponse::ExitWithCode(code) => close_locked(&mut shared, ExitInfo::code(code)),
            SignalResponse::TerminateBySignal => close_locked(&mut shared, ExitInfo::signal(signal)),
        }
        Ok(())
    }

    fn has_exited(&self) -> bool {
        let shared = self.shared.lock().unwrap();
        shared.closed || shared.reaped
    }
}
