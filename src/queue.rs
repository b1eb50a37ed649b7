use std::sync::Mutex;

use crate::message::IndexEntry;

/// Process-wide queue of messages awaiting embedding and vector upsert.
///
/// Entries accumulate across all channels between flushes; a flush drains
/// the queue destructively. The lock is never held across an await.
#[derive(Default)]
pub struct IndexingQueue {
    pending: Mutex<Vec<IndexEntry>>,
}

impl IndexingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, entry: IndexEntry) {
        self.pending.lock().unwrap().push(entry);
    }

    /// Takes every pending entry, leaving the queue empty.
    pub fn drain(&self) -> Vec<IndexEntry> {
        std::mem::take(&mut *self.pending.lock().unwrap())
    }

    /// Queued-but-unflushed entries for one channel.
    pub fn pending_for_channel(&self, channel_id: u64) -> usize {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.channel_id == channel_id)
            .count()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().unwrap().is_empty()
    }
}
