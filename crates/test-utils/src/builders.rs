#![allow(dead_code)]

use std::sync::Arc;

use sentinelle::config::{SupervisorConfig, SupervisorOptions};
use sentinelle::engine::{Backends, Supervisor};
use sentinelle::fs::mock::MockFileSystem;
use sentinelle::types::{GracePeriod, Signal, StdioConfig};

use crate::fake_spawner::FakeSpawner;
use crate::fake_watcher::FakeWatchBackend;

/// Builder for `SupervisorOptions` to simplify test setup.
pub struct SupervisorOptionsBuilder {
    options: SupervisorOptions,
}

impl SupervisorOptionsBuilder {
    pub fn new(entry: &str) -> Self {
        Self {
            options: SupervisorOptions::new(entry),
        }
    }

    pub fn bin(mut self, bin: &str) -> Self {
        self.options.bin = Some(bin.to_string());
        self
    }

    pub fn entry_arg(mut self, arg: &str) -> Self {
        self.options.entry_args.push(arg.to_string());
        self
    }

    pub fn watch(mut self, path: &str) -> Self {
        self.options.watch.push(path.to_string());
        self
    }

    pub fn grace_period(mut self, value: impl Into<GracePeriod>) -> Self {
        self.options.shutdown_grace_period = Some(value.into());
        self
    }

    pub fn signal(mut self, signal: Signal) -> Self {
        self.options.shutdown_signal = Some(signal);
        self
    }

    pub fn stdio(mut self, stdio: StdioConfig) -> Self {
        self.options.stdio = Some(stdio);
        self
    }

    pub fn build(self) -> SupervisorOptions {
        self.options
    }

    /// Validate against `fs`, panicking on error.
    pub fn validate(self, fs: &MockFileSystem) -> SupervisorConfig {
        SupervisorConfig::from_options(self.options, fs)
            .expect("Failed to build valid config from builder")
    }
}

/// A supervisor wired to fakes, plus handles to drive them.
pub struct Harness {
    pub supervisor: Supervisor,
    pub spawner: FakeSpawner,
    pub watcher: FakeWatchBackend,
}

impl Harness {
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_spawner(config, FakeSpawner::new())
    }

    pub fn with_spawner(config: SupervisorConfig, spawner: FakeSpawner) -> Self {
        let watcher = FakeWatchBackend::new();
        let backends = Backends::new(Arc::new(spawner.clone()), Arc::new(watcher.clone()));
        Self {
            supervisor: Supervisor::new(config, backends),
            spawner,
            watcher,
        }
    }
}

/// A mock filesystem holding one executable entry file at `entry`.
pub fn fs_with_executable(entry: &str) -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_executable(entry);
    fs
}
