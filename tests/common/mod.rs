#![allow(dead_code, unused_imports)]

use std::time::Duration;

use tokio::sync::mpsc;

use sentinelle::errors::SentinelleError;
use sentinelle::exec::{CommandSpec, ManagedProcess, ProcessOptions};
use sentinelle::types::{Signal, StdioConfig};

pub use sentinelle_test_utils::{
    FakeProcess, FakeSpawner, FakeWatchBackend, Harness, SignalResponse, SupervisorOptionsBuilder,
    fs_with_executable, init_tracing, settle, with_timeout,
};

pub fn process_options(grace_ms: u64) -> ProcessOptions {
    ProcessOptions {
        shutdown_signal: Signal::SIGINT,
        grace_period: Duration::from_millis(grace_ms),
        stdio: StdioConfig::default(),
    }
}

/// Spawn one managed process through `spawner`.
pub fn spawn_managed(
    spawner: &FakeSpawner,
    grace_ms: u64,
) -> (
    ManagedProcess,
    FakeProcess,
    mpsc::UnboundedReceiver<SentinelleError>,
) {
    let (faults_tx, faults_rx) = mpsc::unbounded_channel();
    let process = ManagedProcess::spawn(
        CommandSpec::new("/tmp/app.sh", Vec::new()),
        process_options(grace_ms),
        spawner,
        faults_tx,
    )
    .expect("fake spawn should succeed");
    let fake = spawner.last().expect("spawner recorded the process");
    (process, fake, faults_rx)
}
