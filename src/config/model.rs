// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::exec::{CommandSpec, ProcessOptions};
use crate::types::{GracePeriod, Signal, StdioConfig};

/// Unvalidated supervisor construction options.
///
/// These come from the CLI, an optional TOML file, or directly from library
/// callers. Turn them into a [`SupervisorConfig`] with
/// [`SupervisorConfig::from_options`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupervisorOptions {
    /// Binary (plus any arguments for it) used to run `entry`.
    #[serde(default)]
    pub bin: Option<String>,

    /// Entry file, optionally followed by whitespace-separated arguments.
    pub entry: String,

    /// Extra arguments appended after the ones embedded in `entry`.
    #[serde(default)]
    pub entry_args: Vec<String>,

    /// Paths watched in addition to the entry file's directory.
    #[serde(default)]
    pub watch: Vec<String>,

    #[serde(default)]
    pub shutdown_grace_period: Option<GracePeriod>,

    #[serde(default, deserialize_with = "crate::types::deserialize_signal")]
    pub shutdown_signal: Option<Signal>,

    #[serde(default)]
    pub stdio: Option<StdioConfig>,
}

impl SupervisorOptions {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            ..Self::default()
        }
    }

    /// Fill every option that is still unset from the `[process]` section of
    /// a config file. Watch paths from both sources are combined.
    pub fn with_file_defaults(mut self, section: &ProcessSection) -> Self {
        if self.bin.is_none() {
            self.bin = section.bin.clone();
        }
        if self.shutdown_grace_period.is_none() {
            self.shutdown_grace_period = section.grace_period.clone();
        }
        if self.shutdown_signal.is_none() {
            self.shutdown_signal = section.kill;
        }
        if self.stdio.is_none() {
            self.stdio = section.stdio;
        }

        let mut watch = section.watch.clone();
        watch.append(&mut self.watch);
        self.watch = watch;

        self
    }
}

/// On-disk configuration file (TOML).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub process: ProcessSection,
}

/// `[process]` section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessSection {
    #[serde(default)]
    pub bin: Option<String>,

    #[serde(default)]
    pub watch: Vec<String>,

    #[serde(default, deserialize_with = "crate::types::deserialize_signal")]
    pub kill: Option<Signal>,

    #[serde(default)]
    pub grace_period: Option<GracePeriod>,

    #[serde(default)]
    pub stdio: Option<StdioConfig>,
}

/// Validated supervisor configuration.
///
/// Only constructed through [`SupervisorConfig::from_options`], so holding one
/// means the entry file was readable, the binary was found and every option
/// parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub(crate) entry: PathBuf,
    pub(crate) command: CommandSpec,
    pub(crate) watch_paths: Vec<PathBuf>,
    pub(crate) process: ProcessOptions,
}

impl SupervisorConfig {
    /// Absolute path of the entry file.
    pub fn entry(&self) -> &PathBuf {
        &self.entry
    }

    /// Command every managed process is spawned with.
    pub fn command(&self) -> &CommandSpec {
        &self.command
    }

    /// De-duplicated watch set (never contains the filesystem root).
    pub fn watch_paths(&self) -> &[PathBuf] {
        &self.watch_paths
    }

    pub fn process(&self) -> &ProcessOptions {
        &self.process
    }
}
