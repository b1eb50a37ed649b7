use std::collections::VecDeque;

use crate::message::ChannelMessage;

/// Fixed-capacity recent-message buffer with strict FIFO eviction.
///
/// Pushing into a full window drops the oldest entry first; iteration order
/// is arrival order (oldest first). Capacity is fixed at construction.
pub struct MessageWindow {
    items: VecDeque<ChannelMessage>,
    capacity: usize,
}

impl MessageWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, message: ChannelMessage) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(message);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelMessage> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
