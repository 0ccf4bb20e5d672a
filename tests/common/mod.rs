#![allow(dead_code)]

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

const WAIT_LIMIT: Duration = Duration::from_secs(10);

/// Collects handler observations across threads and lets tests block until an
/// expected number arrived.
pub struct Recorder<T> {
    entries: Mutex<Vec<T>>,
    grew: Condvar,
}

impl<T: Clone> Recorder<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            grew: Condvar::new(),
        }
    }

    pub fn record(&self, value: T) {
        let mut entries = self.entries.lock().unwrap();
        entries.push(value);
        self.grew.notify_all();
    }

    /// Snapshot of everything recorded so far.
    pub fn entries(&self) -> Vec<T> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Blocks until at least `count` entries were recorded, then snapshots.
    pub fn wait_for(&self, count: usize) -> Vec<T> {
        let deadline = Instant::now() + WAIT_LIMIT;
        let mut entries = self.entries.lock().unwrap();
        while entries.len() < count {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .unwrap_or_else(|| {
                    panic!(
                        "timed out waiting for {count} events, saw {}",
                        entries.len()
                    )
                });
            let (guard, _) = self.grew.wait_timeout(entries, remaining).unwrap();
            entries = guard;
        }
        entries.clone()
    }
}
