// tests/supervisor.rs
mod common;
use crate::common::{
    FakeSpawner, Harness, SignalResponse, SupervisorOptionsBuilder, fs_with_executable,
    init_tracing, settle, with_timeout,
};

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use nix::errno::Errno;

use sentinelle::config::SupervisorConfig;
use sentinelle::exec::ProcessState;
use sentinelle::fs::mock::MockFileSystem;
use sentinelle::types::{FORCE_SIGNAL, Signal};

type TestResult = Result<(), Box<dyn Error>>;

fn app_config() -> SupervisorConfig {
    let fs = fs_with_executable("/tmp/app.js");
    SupervisorOptionsBuilder::new("/tmp/app.js").validate(&fs)
}

fn harness(response: SignalResponse) -> Harness {
    Harness::with_spawner(app_config(), FakeSpawner::with_response(response))
}

#[tokio::test(start_paused = true)]
async fn entry_runs_as_its_own_executable() -> TestResult {
    init_tracing();

    let h = Harness::new(app_config());
    h.supervisor.start().await?;

    let commands = h.spawner.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].argv(), vec!["/tmp/app.js".to_string()]);

    assert!(h.supervisor.watch_paths().contains(&PathBuf::from("/tmp")));
    assert_eq!(h.watcher.last_watched(), Some(vec![PathBuf::from("/tmp")]));
    assert_eq!(h.supervisor.current_state(), Some(ProcessState::Started));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn bin_and_entry_are_tokenised() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file("/tmp/app.py");
    fs.add_binary("python");

    let config = SupervisorOptionsBuilder::new("/tmp/app.py arg1 arg2")
        .bin("python script-runner")
        .validate(&fs);
    let h = Harness::new(config);
    h.supervisor.start().await?;

    let command = &h.spawner.commands()[0];
    assert_eq!(command.program, "python");
    assert_eq!(
        command.args,
        vec!["script-runner", "/tmp/app.py", "arg1", "arg2"]
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn burst_of_changes_restarts_once() -> TestResult {
    init_tracing();

    let h = Harness::new(app_config());
    h.supervisor.start().await?;
    let first = h.spawner.last().unwrap();

    assert!(h.watcher.change("/tmp/app.js"));
    assert!(h.watcher.change("/tmp/app.js"));

    with_timeout(h.spawner.wait_for_spawns(2)).await;
    settle().await;

    assert_eq!(h.spawner.spawn_count(), 2);
    assert_eq!(first.signals(), vec![Signal::SIGINT]);
    assert_eq!(h.supervisor.current_state(), Some(ProcessState::Started));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn changes_while_stopping_collapse_into_one_restart() -> TestResult {
    init_tracing();

    for burst in [1usize, 2, 5, 20] {
        let h = harness(SignalResponse::Ignore);
        h.supervisor.start().await?;
        let first = h.spawner.last().unwrap();

        for _ in 0..burst {
            h.watcher.change("/tmp/app.js");
        }
        settle().await;

        assert_eq!(h.supervisor.current_state(), Some(ProcessState::Stopping));
        assert_eq!(first.signals(), vec![Signal::SIGINT], "burst of {burst}");
        assert_eq!(h.spawner.spawn_count(), 1);

        first.exit(0);
        with_timeout(h.spawner.wait_for_spawns(2)).await;

        // A genuinely new change after the restart triggers exactly one more.
        h.watcher.change("/tmp/app.js");
        settle().await;
        let second = h.spawner.last().unwrap();
        assert_eq!(second.signals(), vec![Signal::SIGINT]);
        second.exit(0);
        with_timeout(h.spawner.wait_for_spawns(3)).await;
        settle().await;

        assert_eq!(h.spawner.spawn_count(), 3, "burst of {burst}");
    }

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stubborn_process_is_killed_before_restart() -> TestResult {
    init_tracing();

    let h = harness(SignalResponse::Ignore);
    h.supervisor.start().await?;
    let first = h.spawner.last().unwrap();

    h.watcher.change("/tmp/app.js");
    settle().await;
    assert_eq!(h.spawner.spawn_count(), 1);

    tokio::time::sleep(Duration::from_millis(4001)).await;
    with_timeout(h.spawner.wait_for_spawns(2)).await;

    assert_eq!(first.signals(), vec![Signal::SIGINT, FORCE_SIGNAL]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn change_after_exit_starts_again() -> TestResult {
    init_tracing();

    let h = Harness::new(app_config());
    h.supervisor.start().await?;
    let first = h.spawner.last().unwrap();

    first.exit(1);
    settle().await;
    assert_eq!(h.supervisor.current_state(), Some(ProcessState::Exited));

    h.watcher.change("/tmp/app.js");
    with_timeout(h.spawner.wait_for_spawns(2)).await;

    assert!(first.signals().is_empty());
    assert_eq!(h.watcher.watch_calls(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn spawn_failure_leaves_supervisor_usable() -> TestResult {
    init_tracing();

    let h = Harness::new(app_config());
    h.spawner.fail_next_spawn(Errno::EACCES);

    h.supervisor.start().await?;
    assert_eq!(h.supervisor.current_state(), None);
    assert!(h.supervisor.is_watching());

    h.watcher.change("/tmp/app.js");
    with_timeout(h.spawner.wait_for_spawns(1)).await;
    settle().await;

    assert_eq!(h.supervisor.current_state(), Some(ProcessState::Started));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn watcher_failure_fails_start() {
    init_tracing();

    let h = Harness::new(app_config());
    h.watcher.fail_next_watch("inotify limit reached");

    assert!(h.supervisor.start().await.is_err());
    assert_eq!(h.spawner.spawn_count(), 0);
    assert!(!h.supervisor.is_watching());
}

#[tokio::test(start_paused = true)]
async fn watcher_errors_are_not_fatal() -> TestResult {
    init_tracing();

    let h = Harness::new(app_config());
    h.supervisor.start().await?;

    assert!(h.watcher.error("watch descriptor lost"));
    settle().await;

    assert_eq!(h.supervisor.current_state(), Some(ProcessState::Started));
    assert!(h.supervisor.is_watching());
    assert_eq!(h.spawner.spawn_count(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn restart_and_stop_without_process_do_nothing() -> TestResult {
    init_tracing();

    let h = Harness::new(app_config());

    h.supervisor.restart(None).await?;
    h.supervisor.stop(None).await;

    assert_eq!(h.spawner.spawn_count(), 0);
    assert_eq!(h.watcher.watch_calls(), 0);
    assert_eq!(h.watcher.close_count(), 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn explicit_restart_uses_given_signal() -> TestResult {
    init_tracing();

    let h = Harness::new(app_config());
    h.supervisor.start().await?;
    let first = h.spawner.last().unwrap();

    with_timeout(h.supervisor.restart(Some(Signal::SIGTERM))).await?;

    assert_eq!(first.signals(), vec![Signal::SIGTERM]);
    assert_eq!(h.spawner.spawn_count(), 2);
    assert_eq!(h.supervisor.current_state(), Some(ProcessState::Started));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn restart_runs_detached_from_its_handle() -> TestResult {
    init_tracing();

    let h = Harness::new(app_config());
    h.supervisor.start().await?;
    let first = h.spawner.last().unwrap();

    // The handle the restart was requested through is dropped right away.
    let restarting = h.supervisor.clone().restart(None);
    with_timeout(tokio::spawn(restarting)).await??;

    assert_eq!(first.signals(), vec![Signal::SIGINT]);
    assert_eq!(h.spawner.spawn_count(), 2);
    assert_eq!(h.supervisor.current_state(), Some(ProcessState::Started));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_releases_watcher_and_stops_process() -> TestResult {
    init_tracing();

    let h = Harness::new(app_config());
    h.supervisor.start().await?;

    with_timeout(h.supervisor.stop(None)).await;

    assert_eq!(h.supervisor.current_state(), Some(ProcessState::Stopped));
    assert_eq!(h.watcher.close_count(), 1);
    assert!(!h.watcher.is_active());
    assert!(!h.supervisor.is_watching());

    // A later start watches again.
    h.supervisor.start().await?;
    assert_eq!(h.watcher.watch_calls(), 2);
    assert_eq!(h.spawner.spawn_count(), 2);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn forced_stop_sends_force_signal() -> TestResult {
    init_tracing();

    let h = harness(SignalResponse::Ignore);
    h.supervisor.start().await?;
    let first = h.spawner.last().unwrap();

    with_timeout(h.supervisor.stop(Some(FORCE_SIGNAL))).await;

    assert_eq!(first.signals(), vec![FORCE_SIGNAL]);
    assert_eq!(h.supervisor.current_state(), Some(ProcessState::Killed));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn start_waits_for_previous_process_to_close() -> TestResult {
    init_tracing();

    let h = harness(SignalResponse::Ignore);
    h.supervisor.start().await?;
    let first = h.spawner.last().unwrap();

    let _closing = h.supervisor.current_process().unwrap().kill(None);

    let supervisor = h.supervisor.clone();
    let starting = tokio::spawn(async move { supervisor.start().await });
    settle().await;
    assert_eq!(h.spawner.spawn_count(), 1);

    first.exit(0);
    with_timeout(starting).await??;

    assert_eq!(h.spawner.spawn_count(), 2);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_during_restart_abandons_the_restart() -> TestResult {
    init_tracing();

    let h = harness(SignalResponse::Ignore);
    h.supervisor.start().await?;
    let first = h.spawner.last().unwrap();

    h.watcher.change("/tmp/app.js");
    settle().await;
    assert_eq!(h.supervisor.current_state(), Some(ProcessState::Stopping));

    let supervisor = h.supervisor.clone();
    let stopping = tokio::spawn(async move { supervisor.stop(None).await });
    settle().await;

    first.exit(0);
    with_timeout(stopping).await?;
    settle().await;

    assert_eq!(h.spawner.spawn_count(), 1);
    assert_eq!(h.supervisor.current_state(), Some(ProcessState::Stopped));
    assert!(!h.supervisor.is_watching());

    Ok(())
}
