// src/watch/mod.rs

//! File watching.
//!
//! This module is responsible for:
//! - Computing which paths to watch for a given entry file.
//! - Wiring up a cross-platform filesystem watcher (`notify`) behind the
//!   [`WatchBackend`] trait.
//!
//! It does **not** decide what a change means; the supervisor does that.

pub mod backend;
pub mod paths;

pub use backend::{NotifyBackend, WatchBackend, WatchEvent, WatchSubscription};
pub use paths::{compute_watch_set, is_filesystem_root, resolve_path};
