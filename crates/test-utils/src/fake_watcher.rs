use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use sentinelle::errors::{Result, SentinelleError};
use sentinelle::watch::{WatchBackend, WatchEvent, WatchSubscription};

/// A fake watch backend that lets tests inject change and error events.
#[derive(Clone, Default)]
pub struct FakeWatchBackend {
    state: Arc<Mutex<WatchState>>,
}

#[derive(Default)]
struct WatchState {
    watched: Vec<Vec<PathBuf>>,
    sender: Option<mpsc::UnboundedSender<WatchEvent>>,
    closed: usize,
    fail_next: Option<String>,
}

impl FakeWatchBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `watch` was called.
    pub fn watch_calls(&self) -> usize {
        self.state.lock().unwrap().watched.len()
    }

    /// Paths passed to the most recent `watch` call.
    pub fn last_watched(&self) -> Option<Vec<PathBuf>> {
        self.state.lock().unwrap().watched.last().cloned()
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    /// True while a subscription is open.
    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().sender.is_some()
    }

    /// Make the next `watch` call fail.
    pub fn fail_next_watch(&self, message: &str) {
        self.state.lock().unwrap().fail_next = Some(message.to_string());
    }

    /// Report a change under `path`. Returns false if nothing is subscribed.
    pub fn change(&self, path: &str) -> bool {
        self.send(WatchEvent::Changed(vec![PathBuf::from(path)]))
    }

    /// Report a watcher failure. Returns false if nothing is subscribed.
    pub fn error(&self, message: &str) -> bool {
        self.send(WatchEvent::Error(notify::Error::generic(message)))
    }

    fn send(&self, event: WatchEvent) -> bool {
        let state = self.state.lock().unwrap();
        match &state.sender {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

impl WatchBackend for FakeWatchBackend {
    fn watch(
        &self,
        paths: &[PathBuf],
        events: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<Box<dyn WatchSubscription>> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.fail_next.take() {
            return Err(SentinelleError::Watch(notify::Error::generic(&message)));
        }

        state.watched.push(paths.to_vec());
        state.sender = Some(events);

        Ok(Box::new(FakeSubscription {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeSubscription {
    state: Arc<Mutex<WatchState>>,
}

impl WatchSubscription for FakeSubscription {
    fn close(self: Box<Self>) {
        let mut state = self.state.lock().unwrap();
        state.sender = None;
        state.closed += 1;
    }
}
