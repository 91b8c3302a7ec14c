// src/config/mod.rs

//! Supervisor configuration.
//!
//! - [`model`] holds the unvalidated [`SupervisorOptions`], the TOML file
//!   model and the validated [`SupervisorConfig`].
//! - [`loader`] reads the optional TOML file.
//! - [`validate`] turns options into a config, failing fast on bad input.
//! - [`duration`] parses human-readable grace periods.

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_time;
pub use loader::{load_from_path, parse_config};
pub use model::{ConfigFile, ProcessSection, SupervisorConfig, SupervisorOptions};
pub use validate::{split_command, split_entry};
