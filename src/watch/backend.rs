// src/watch/backend.rs

//! Filesystem watch capability.
//!
//! The supervisor only needs "tell me when something under these paths
//! changed". [`NotifyBackend`] provides that with `notify`; tests swap in a
//! fake that lets them inject events directly.

use std::path::PathBuf;

use notify::event::EventKind;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::Result;

/// Event delivered by a watch subscription.
#[derive(Debug)]
pub enum WatchEvent {
    /// Something was created, modified or removed under a watched path.
    Changed(Vec<PathBuf>),
    /// The watcher itself failed.
    Error(notify::Error),
}

/// Live subscription returned by [`WatchBackend::watch`].
pub trait WatchSubscription: Send {
    /// Stop watching. No events are delivered once this returns.
    fn close(self: Box<Self>);
}

/// Factory for watch subscriptions.
pub trait WatchBackend: Send + Sync {
    fn watch(
        &self,
        paths: &[PathBuf],
        events: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<Box<dyn WatchSubscription>>;
}

/// Production backend built on `notify::RecommendedWatcher`.
#[derive(Debug, Clone, Default)]
pub struct NotifyBackend;

/// Keeps the underlying watcher alive. Dropping it stops file watching.
pub struct NotifySubscription {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for NotifySubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifySubscription").finish()
    }
}

impl WatchSubscription for NotifySubscription {
    fn close(self: Box<Self>) {
        debug!("closing notify watcher");
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(
        &self,
        paths: &[PathBuf],
        events: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<Box<dyn WatchSubscription>> {
        // Called synchronously by notify on its own thread.
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // Send errors only mean the supervisor already stopped watching.
                let _ = match res {
                    Ok(event) if is_relevant(&event.kind) => {
                        events.send(WatchEvent::Changed(event.paths))
                    }
                    Ok(_) => Ok(()),
                    Err(err) => events.send(WatchEvent::Error(err)),
                };
            },
            Config::default(),
        )?;

        for path in paths {
            let mode = if path.is_dir() {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            watcher.watch(path, mode)?;
        }

        Ok(Box::new(NotifySubscription { _inner: watcher }))
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
