// tests/process_lifecycle.rs
mod common;
use crate::common::{FakeSpawner, SignalResponse, init_tracing, settle, spawn_managed, with_timeout};

use std::time::Duration;

use nix::errno::Errno;
use tokio::sync::mpsc;

use sentinelle::errors::SentinelleError;
use sentinelle::exec::diagnostics::{SHEBANG_HINT, hint_for};
use sentinelle::exec::{
    CommandSpec, DebuggerState, ExitInfo, KillReason, ManagedProcess, ProcessState,
};
use sentinelle::types::{FORCE_SIGNAL, Signal};

const GRACE_MS: u64 = 4000;

#[tokio::test(start_paused = true)]
async fn fresh_process_is_started() {
    init_tracing();

    let spawner = FakeSpawner::new();
    let (process, fake, _faults) = spawn_managed(&spawner, GRACE_MS);

    assert_eq!(process.state(), ProcessState::Started);
    assert_eq!(process.debugger_state(), DebuggerState::Disabled);
    assert_eq!(process.kill_reason(), None);
    assert_eq!(process.pid(), fake.pid());
    assert!(!process.is_closed());
}

#[tokio::test(start_paused = true)]
async fn clean_exit_while_started_is_exited() {
    init_tracing();

    let spawner = FakeSpawner::new();
    let (process, fake, _faults) = spawn_managed(&spawner, GRACE_MS);

    fake.close(ExitInfo {
        code: Some(0),
        signal: None,
    });
    with_timeout(process.await_closed()).await;

    assert_eq!(process.state(), ProcessState::Exited);
    assert_eq!(process.kill_reason(), None);
}

#[tokio::test(start_paused = true)]
async fn crash_while_started_is_exited() {
    init_tracing();

    let spawner = FakeSpawner::new();
    let (process, fake, _faults) = spawn_managed(&spawner, GRACE_MS);

    fake.exit(3);
    with_timeout(process.await_closed()).await;

    assert_eq!(process.state(), ProcessState::Exited);
}

#[tokio::test(start_paused = true)]
async fn clean_exit_while_stopping_is_stopped() {
    init_tracing();

    let spawner = FakeSpawner::with_response(SignalResponse::Ignore);
    let (process, fake, _faults) = spawn_managed(&spawner, GRACE_MS);

    let stopping = process.kill(None);
    assert_eq!(process.state(), ProcessState::Stopping);
    assert_eq!(fake.signals(), vec![Signal::SIGINT]);

    fake.close(ExitInfo {
        code: Some(0),
        signal: None,
    });
    with_timeout(stopping).await;

    assert_eq!(process.state(), ProcessState::Stopped);
    assert_eq!(process.kill_reason(), None);
}

#[tokio::test(start_paused = true)]
async fn crash_while_stopping_is_stopped() {
    init_tracing();

    let spawner = FakeSpawner::with_response(SignalResponse::ExitWithCode(130));
    let (process, _fake, _faults) = spawn_managed(&spawner, GRACE_MS);

    with_timeout(process.kill(None)).await;

    assert_eq!(process.state(), ProcessState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn death_by_shutdown_signal_is_stopped() {
    init_tracing();

    let spawner = FakeSpawner::with_response(SignalResponse::TerminateBySignal);
    let (process, fake, _faults) = spawn_managed(&spawner, GRACE_MS);

    with_timeout(process.kill(Some(Signal::SIGTERM))).await;

    assert_eq!(fake.signals(), vec![Signal::SIGTERM]);
    assert_eq!(process.state(), ProcessState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn force_signal_exit_is_killed_from_any_state() {
    init_tracing();

    // Killed from outside while running.
    let spawner = FakeSpawner::with_response(SignalResponse::Ignore);
    let (running, fake, _faults) = spawn_managed(&spawner, GRACE_MS);
    fake.close(ExitInfo::signal(FORCE_SIGNAL));
    with_timeout(running.await_closed()).await;
    assert_eq!(running.state(), ProcessState::Killed);
    assert_eq!(running.kill_reason(), None);

    // Killed from outside while shutting down.
    let (stopping, fake, _faults) = spawn_managed(&spawner, GRACE_MS);
    let closed = stopping.kill(None);
    fake.close(ExitInfo::signal(FORCE_SIGNAL));
    with_timeout(closed).await;
    assert_eq!(stopping.state(), ProcessState::Killed);
}

#[tokio::test(start_paused = true)]
async fn grace_period_expiry_sends_exactly_one_force_kill() {
    init_tracing();

    let spawner = FakeSpawner::with_response(SignalResponse::Ignore);
    let (process, fake, _faults) = spawn_managed(&spawner, GRACE_MS);

    let closed = process.kill(None);
    // A repeated request must not arm a second timer.
    let _ = process.kill(None);
    assert_eq!(fake.signals(), vec![Signal::SIGINT, Signal::SIGINT]);

    tokio::time::sleep(Duration::from_millis(GRACE_MS - 1)).await;
    assert_eq!(process.state(), ProcessState::Stopping);
    assert_eq!(fake.signals(), vec![Signal::SIGINT, Signal::SIGINT]);

    tokio::time::sleep(Duration::from_millis(2)).await;
    with_timeout(closed).await;

    assert_eq!(
        fake.signals(),
        vec![Signal::SIGINT, Signal::SIGINT, FORCE_SIGNAL]
    );
    assert_eq!(process.state(), ProcessState::Killed);
    assert_eq!(process.kill_reason(), Some(KillReason::GracePeriodExpired));

    // Nothing further happens once closed.
    tokio::time::sleep(Duration::from_millis(GRACE_MS * 2)).await;
    assert_eq!(fake.signals().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn exit_within_grace_period_cancels_escalation() {
    init_tracing();

    let spawner = FakeSpawner::with_response(SignalResponse::Ignore);
    let (process, fake, _faults) = spawn_managed(&spawner, GRACE_MS);

    let closed = process.kill(None);
    tokio::time::sleep(Duration::from_millis(100)).await;
    fake.exit(0);
    with_timeout(closed).await;

    tokio::time::sleep(Duration::from_millis(GRACE_MS)).await;
    assert_eq!(fake.signals(), vec![Signal::SIGINT]);
    assert_eq!(process.state(), ProcessState::Stopped);
    assert_eq!(process.kill_reason(), None);
}

#[tokio::test(start_paused = true)]
async fn force_kill_request_does_not_arm_timer() {
    init_tracing();

    let spawner = FakeSpawner::with_response(SignalResponse::Ignore);
    let (process, fake, _faults) = spawn_managed(&spawner, GRACE_MS);

    with_timeout(process.kill(Some(FORCE_SIGNAL))).await;

    assert_eq!(fake.signals(), vec![FORCE_SIGNAL]);
    assert_eq!(process.state(), ProcessState::Killed);
    assert_eq!(process.kill_reason(), None);
}

#[tokio::test(start_paused = true)]
async fn hanging_debugger_is_killed_without_waiting() {
    init_tracing();

    let spawner = FakeSpawner::with_response(SignalResponse::Ignore);
    let (process, fake, _faults) = spawn_managed(&spawner, GRACE_MS);

    fake.stderr("Debugger listening on ws://127.0.0.1:9229/abc\n");
    fake.stderr("Debugger attached.\n");
    settle().await;
    assert_eq!(process.debugger_state(), DebuggerState::Attached);

    fake.stderr("Waiting for the debugger to disconnect...\n");
    with_timeout(process.await_closed()).await;

    assert_eq!(fake.signals(), vec![FORCE_SIGNAL]);
    assert_eq!(process.debugger_state(), DebuggerState::Hanging);
    assert_eq!(process.kill_reason(), Some(KillReason::HangingDebugger));
    assert_eq!(process.state(), ProcessState::Killed);
}

#[tokio::test(start_paused = true)]
async fn paused_debugger_is_killed_after_grace_period() {
    init_tracing();

    let spawner = FakeSpawner::with_response(SignalResponse::Ignore);
    let (process, fake, _faults) = spawn_managed(&spawner, GRACE_MS);

    fake.stderr("Debugger attached.\n");
    settle().await;

    let closed = process.kill(None);
    tokio::time::sleep(Duration::from_millis(GRACE_MS + 1)).await;
    with_timeout(closed).await;

    assert_eq!(fake.signals(), vec![Signal::SIGINT, FORCE_SIGNAL]);
    assert_eq!(process.kill_reason(), Some(KillReason::PausedDebugger));
    assert_eq!(process.state(), ProcessState::Killed);
}

#[tokio::test(start_paused = true)]
async fn kill_on_closed_process_sends_nothing() {
    init_tracing();

    let spawner = FakeSpawner::new();
    let (process, fake, _faults) = spawn_managed(&spawner, GRACE_MS);

    fake.exit(0);
    with_timeout(process.await_closed()).await;

    with_timeout(process.kill(None)).await;
    with_timeout(process.kill(Some(FORCE_SIGNAL))).await;

    assert!(fake.signals().is_empty());
    assert_eq!(process.state(), ProcessState::Exited);
}

#[tokio::test(start_paused = true)]
async fn terminal_state_never_changes() {
    init_tracing();

    let spawner = FakeSpawner::new();
    let (process, fake, _faults) = spawn_managed(&spawner, GRACE_MS);

    with_timeout(process.kill(None)).await;
    assert_eq!(process.state(), ProcessState::Stopped);

    // Late events must not move a closed process.
    fake.stderr("Waiting for the debugger to disconnect...\n");
    fake.close(ExitInfo::signal(FORCE_SIGNAL));
    settle().await;
    tokio::time::sleep(Duration::from_millis(GRACE_MS * 2)).await;

    for _ in 0..3 {
        assert!(process.is_closed());
        assert_eq!(process.state(), ProcessState::Stopped);
    }
    assert_eq!(process.kill_reason(), None);
}

#[tokio::test(start_paused = true)]
async fn concurrent_waiters_resolve_together() {
    init_tracing();

    let spawner = FakeSpawner::new();
    let (process, fake, _faults) = spawn_managed(&spawner, GRACE_MS);

    let waiters: Vec<_> = (0..3)
        .map(|_| tokio::spawn(process.await_closed()))
        .collect();
    settle().await;
    assert!(waiters.iter().all(|w| !w.is_finished()));

    fake.exit(0);
    for waiter in waiters {
        with_timeout(waiter).await.unwrap();
    }
    assert_eq!(process.state(), ProcessState::Exited);
}

#[tokio::test(start_paused = true)]
async fn unmatched_exit_is_reported_as_fault() {
    init_tracing();

    let spawner = FakeSpawner::new();
    let (process, fake, mut faults) = spawn_managed(&spawner, GRACE_MS);

    // Non-zero code together with a signal matches no rule.
    fake.close(ExitInfo {
        code: Some(3),
        signal: Some(Signal::SIGTERM),
    });

    let fault = with_timeout(faults.recv()).await.unwrap();
    assert!(fault.is_invariant_violation());
    assert!(matches!(fault, SentinelleError::UnexpectedExit { .. }));
    assert_eq!(process.state(), ProcessState::Started);
}

#[tokio::test(start_paused = true)]
async fn lost_event_stream_is_reported_as_fault() {
    init_tracing();

    let spawner = FakeSpawner::new();
    let (_process, fake, mut faults) = spawn_managed(&spawner, GRACE_MS);

    fake.vanish();

    let fault = with_timeout(faults.recv()).await.unwrap();
    assert!(matches!(
        fault,
        SentinelleError::EventStreamClosed { pid } if pid == fake.pid()
    ));
}

#[tokio::test(start_paused = true)]
async fn spawn_failure_is_returned_with_hint() {
    init_tracing();

    let spawner = FakeSpawner::new();
    spawner.fail_next_spawn(Errno::ENOEXEC);

    let (faults_tx, _faults_rx) = mpsc::unbounded_channel();
    let err = ManagedProcess::spawn(
        CommandSpec::new("/tmp/app.sh", Vec::new()),
        common::process_options(GRACE_MS),
        &spawner,
        faults_tx,
    )
    .unwrap_err();

    assert!(matches!(err, SentinelleError::Spawn { .. }));
    assert_eq!(hint_for(&err), Some(SHEBANG_HINT));
    assert_eq!(spawner.spawn_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn grace_expiry_after_exit_does_not_escalate() {
    init_tracing();

    let spawner = FakeSpawner::with_response(SignalResponse::Ignore);
    let (process, fake, _faults) = spawn_managed(&spawner, GRACE_MS);

    let stopping = process.kill(None);
    // Exits in time, but the close event is held back past the grace period.
    fake.reap();
    tokio::time::sleep(Duration::from_millis(GRACE_MS + 100)).await;

    assert_eq!(fake.signals(), vec![Signal::SIGINT]);
    assert_eq!(process.kill_reason(), None);
    assert_eq!(process.state(), ProcessState::Stopping);

    fake.exit(0);
    with_timeout(stopping).await;

    assert_eq!(process.state(), ProcessState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn kill_after_exit_sends_no_signal() {
    init_tracing();

    let spawner = FakeSpawner::new();
    let (process, fake, mut faults) = spawn_managed(&spawner, GRACE_MS);

    fake.reap();
    let stopping = process.kill(None);
    assert!(fake.signals().is_empty());

    fake.exit(0);
    with_timeout(stopping).await;

    assert_eq!(process.state(), ProcessState::Stopped);
    assert!(faults.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn kill_future_outlives_its_handle() {
    init_tracing();

    let spawner = FakeSpawner::new();
    let (process, _fake, _faults) = spawn_managed(&spawner, GRACE_MS);
    let observer = process.clone();

    let stopping = {
        let handle = process;
        handle.kill(None)
    };
    with_timeout(stopping).await;

    assert_eq!(observer.state(), ProcessState::Stopped);
}
