//! Offline retry queue

use std::collections::VecDeque;

use crate::models::Draft;

/// FIFO of draft snapshots whose push failed or was deferred while offline.
#[derive(Debug, Default)]
pub struct SyncQueue {
    entries: VecDeque<Draft>,
}

impl SyncQueue {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Append a snapshot at the back
    pub fn enqueue(&mut self, draft: Draft) {
        self.entries.push_back(draft);
    }

    /// Take every entry in arrival order, leaving the queue empty.
    ///
    /// Entries that fail again are re-enqueued by the caller, so they land
    /// behind anything queued while the drain was running.
    pub fn take_all(&mut self) -> Vec<Draft> {
        self.entries.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Draft> {
        self.entries.iter()
    }
}
