// src/exec/backend.rs

//! Pluggable process spawning capability.
//!
//! [`ManagedProcess`](super::ManagedProcess) talks to a [`ProcessSpawner`]
//! instead of `tokio::process` directly. Production code uses
//! [`TokioSpawner`]; tests provide a spawner that records commands and lets
//! them script exits, stderr output and signal delivery.

use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStderr, Command};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::errors::{Result, SentinelleError};
use crate::types::{Signal, StdioConfig};

const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_millis(200);

/// Program plus arguments, as handed to the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Full argument vector, program first.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Per-process settings shared by every process a supervisor spawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Signal sent when we want the process to shut down.
    pub shutdown_signal: Signal,
    /// Time allowed between the shutdown signal and a forced kill.
    pub grace_period: Duration,
    pub stdio: StdioConfig,
}

/// How a process terminated.
///
/// Exactly one of `code` / `signal` is normally set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<Signal>,
}

impl ExitInfo {
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn signal(signal: Signal) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: status.signal().and_then(|raw| Signal::try_from(raw).ok()),
        }
    }
}

/// Events a spawned process reports to its [`ManagedProcess`](super::ManagedProcess).
#[derive(Debug)]
pub enum ProcessEvent {
    /// A chunk of the child's stderr (only when stderr is piped).
    Stderr(String),
    /// Something went wrong while observing the child.
    Error(SentinelleError),
    /// The process is gone. Always the last event.
    Closed(ExitInfo),
}

/// Handle used to deliver signals to a spawned process.
pub trait ProcessHandle: Send + Sync {
    fn pid(&self) -> u32;

    /// Deliver `signal`. Fails with `ESRCH` once the process has exited.
    fn signal(&self, signal: Signal) -> Result<()>;

    /// True once the OS process has exited, possibly before the
    /// [`ProcessEvent::Closed`] event has been delivered.
    fn has_exited(&self) -> bool;
}

/// What a [`ProcessSpawner`] hands back for a freshly spawned process.
pub struct SpawnedProcess {
    pub handle: Box<dyn ProcessHandle>,
    pub events: mpsc::UnboundedReceiver<ProcessEvent>,
}

impl fmt::Debug for SpawnedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnedProcess")
            .field("pid", &self.handle.pid())
            .finish_non_exhaustive()
    }
}

/// Trait abstracting how processes are spawned.
pub trait ProcessSpawner: Send + Sync {
    /// Spawn `command` with the given stdio configuration.
    ///
    /// Must be called from within a Tokio runtime.
    fn spawn(&self, command: &CommandSpec, stdio: &StdioConfig) -> Result<SpawnedProcess>;
}

/// Real spawner used in production, backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct TokioSpawner;

impl ProcessSpawner for TokioSpawner {
    fn spawn(&self, command: &CommandSpec, stdio: &StdioConfig) -> Result<SpawnedProcess> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(stdio.stdin.to_stdio())
            .stdout(stdio.stdout.to_stdio())
            .stderr(stdio.stderr.to_stdio())
            // Own process group: a terminal Ctrl-C reaches only us, and we
            // decide what the child gets.
            .process_group(0)
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| SentinelleError::Spawn {
            command: command.to_string(),
            source,
        })?;

        let pid = child.id().unwrap_or_default();
        let reaped = Arc::new(AtomicBool::new(false));
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let stderr_done = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(forward_stderr(pid, stderr, event_tx.clone())));

        let waiter_reaped = Arc::clone(&reaped);
        tokio::spawn(async move {
            let status = child.wait().await;
            // The pid is free for reuse from here on.
            waiter_reaped.store(true, Ordering::SeqCst);

            // Deliver trailing stderr before announcing the exit. Bounded,
            // since a grandchild may keep the pipe open indefinitely.
            if let Some(reader) = stderr_done {
                let _ = tokio::time::timeout(STDERR_DRAIN_TIMEOUT, reader).await;
            }

            let exit = match status {
                Ok(status) => ExitInfo::from(status),
                Err(e) => {
                    let _ = event_tx.send(ProcessEvent::Error(SentinelleError::Io(e)));
                    ExitInfo::default()
                }
            };
            debug!(pid, ?exit, "child process closed");
            let _ = event_tx.send(ProcessEvent::Closed(exit));
        });

        Ok(SpawnedProcess {
            handle: Box::new(PidHandle { pid, reaped }),
            events: event_rx,
        })
    }
}

/// Copy the child's stderr to our own stderr while also reporting each chunk.
async fn forward_stderr(
    pid: u32,
    mut stderr: ChildStderr,
    events: mpsc::UnboundedSender<ProcessEvent>,
) {
    let mut out = tokio::io::stderr();
    let mut buf = vec![0u8; 8 * 1024];

    loop {
        match stderr.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = &buf[..n];
                if out.write_all(chunk).await.is_ok() {
                    let _ = out.flush().await;
                }
                let text = String::from_utf8_lossy(chunk).into_owned();
                let _ = events.send(ProcessEvent::Stderr(text));
            }
            Err(e) => {
                let _ = events.send(ProcessEvent::Error(SentinelleError::Io(e)));
                break;
            }
        }
    }

    trace!(pid, "stderr reader finished");
}

/// Signals a process by pid until it has been reaped.
#[derive(Debug, Clone)]
struct PidHandle {
    pid: u32,
    reaped: Arc<AtomicBool>,
}

impl ProcessHandle for PidHandle {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn signal(&self, signal: Signal) -> Result<()> {
        let result = if self.has_exited() {
            Err(Errno::ESRCH)
        } else {
            kill(Pid::from_raw(self.pid as i32), signal)
        };
        result.map_err(|source| SentinelleError::Signal {
            pid: self.pid,
            signal,
            source,
        })
    }

    fn has_exited(&self) -> bool {
        self.reaped.load(Ordering::SeqCst)
    }
}
