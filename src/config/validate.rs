// src/config/validate.rs

use std::io;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::config::duration::parse_time;
use crate::config::model::{SupervisorConfig, SupervisorOptions};
use crate::errors::{Result, SentinelleError};
use crate::exec::{CommandSpec, ProcessOptions};
use crate::fs::FileSystem;
use crate::types::{DEFAULT_GRACE_PERIOD, DEFAULT_SHUTDOWN_SIGNAL};
use crate::watch::{compute_watch_set, resolve_path};

impl SupervisorConfig {
    /// Validate `options` and resolve everything a supervisor needs.
    ///
    /// Paths containing whitespace cannot be expressed: both `bin` and
    /// `entry` are split on whitespace.
    pub fn from_options(options: SupervisorOptions, fs: &dyn FileSystem) -> Result<Self> {
        let (entry_raw, mut entry_args) = split_entry(&options.entry)?;
        entry_args.extend(options.entry_args.iter().cloned());

        let entry = ensure_file(fs, &entry_raw)?;
        trace!(entry = %entry.display(), ?entry_args, "resolved entry");

        let command = resolve_command(fs, options.bin.as_deref(), &entry, entry_args)?;
        trace!(%command, "resolved command");

        let watch_paths = compute_watch_set(&entry, &options.watch)?;
        trace!(?watch_paths, "resolved watch paths");

        let grace_period = match &options.shutdown_grace_period {
            Some(value) => parse_time(value)?,
            None => DEFAULT_GRACE_PERIOD,
        };

        let process = ProcessOptions {
            shutdown_signal: options.shutdown_signal.unwrap_or(DEFAULT_SHUTDOWN_SIGNAL),
            grace_period,
            stdio: options.stdio.unwrap_or_default(),
        };
        trace!(?process, "resolved process options");

        Ok(SupervisorConfig {
            entry,
            command,
            watch_paths,
            process,
        })
    }
}

/// Split `entry` into the entry path and any arguments embedded after it.
pub fn split_entry(entry: &str) -> Result<(String, Vec<String>)> {
    let mut tokens = tokenize(entry);
    if tokens.is_empty() {
        return Err(SentinelleError::Config(
            "entry must be a non-empty path".to_string(),
        ));
    }
    let path = tokens.remove(0);
    Ok((path, tokens))
}

/// Split a `bin` string into the binary and its own arguments.
pub fn split_command(bin: &str) -> Result<(String, Vec<String>)> {
    let mut tokens = tokenize(bin);
    if tokens.is_empty() {
        return Err(SentinelleError::Config(
            "bin must name a binary when given".to_string(),
        ));
    }
    let binary = tokens.remove(0);
    Ok((binary, tokens))
}

fn tokenize(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

/// Resolve `raw` to an absolute path and make sure it is a readable file.
fn ensure_file(fs: &dyn FileSystem, raw: &str) -> Result<PathBuf> {
    let path = resolve_path(raw)?;

    match fs.check_readable(&path) {
        Ok(()) if fs.is_file(&path) => Ok(path),
        Ok(()) => Err(SentinelleError::Config(format!(
            "entry \"{}\" is not a file",
            path.display()
        ))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SentinelleError::EntryNotFound(path)),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            Err(SentinelleError::EntryUnreadable(path))
        }
        Err(e) if fs.is_dir(&path) => Err(SentinelleError::Config(format!(
            "entry \"{}\" is a directory: {e}",
            path.display()
        ))),
        Err(e) => Err(SentinelleError::Io(e)),
    }
}

/// Build the spawn command: `bin [binArgs...] entry [entryArgs...]`, or the
/// entry itself when no `bin` is given.
fn resolve_command(
    fs: &dyn FileSystem,
    bin: Option<&str>,
    entry: &Path,
    entry_args: Vec<String>,
) -> Result<CommandSpec> {
    let entry_str = entry.to_string_lossy().into_owned();

    match bin {
        Some(bin) => {
            let (binary, bin_args) = split_command(bin)?;
            if fs.find_binary(&binary).is_none() {
                return Err(SentinelleError::BinaryNotFound(binary));
            }

            let mut args = bin_args;
            args.push(entry_str);
            args.extend(entry_args);
            Ok(CommandSpec::new(binary, args))
        }
        None => {
            if !fs.is_executable(entry) {
                return Err(SentinelleError::NotExecutable(entry.to_path_buf()));
            }
            Ok(CommandSpec::new(entry_str, entry_args))
        }
    }
}
