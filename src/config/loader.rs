// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::ConfigFile;
use crate::errors::Result;

/// Load a TOML configuration file.
///
/// This only performs deserialization. Semantic checks (entry readable,
/// binary on PATH, durations parse) happen when the merged options are turned
/// into a [`SupervisorConfig`](crate::config::SupervisorConfig).
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> Result<ConfigFile> {
    let config: ConfigFile = toml::from_str(contents)?;
    Ok(config)
}
