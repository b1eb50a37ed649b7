use std::collections::HashMap;

use crate::participants::ParticipantTable;
use crate::window::MessageWindow;

/// In-memory state for one tracked channel.
pub struct ChannelState {
    pub channel_id: u64,
    pub guild_id: u64,
    pub window: MessageWindow,
    pub participants: ParticipantTable,
}

impl ChannelState {
    fn new(channel_id: u64, guild_id: u64, window_capacity: usize) -> Self {
        Self {
            channel_id,
            guild_id,
            window: MessageWindow::new(window_capacity),
            participants: ParticipantTable::new(),
        }
    }
}

/// Owns every tracked channel's state.
///
/// The key set of the internal map *is* the tracked-channel set: a channel
/// is tracked if and only if its state exists here, so enable/disable keep
/// the two in sync by construction. Persistence to the tracking store is
/// the caller's concern; this registry is purely in-memory.
pub struct ChannelRegistry {
    channels: HashMap<u64, ChannelState>,
    window_capacity: usize,
}

impl ChannelRegistry {
    pub fn new(window_capacity: usize) -> Self {
        Self {
            channels: HashMap::new(),
            window_capacity,
        }
    }

    pub fn is_tracked(&self, channel_id: u64) -> bool {
        self.channels.contains_key(&channel_id)
    }

    /// Starts tracking a channel with an empty window and participant table.
    /// Idempotent: enabling an already-tracked channel keeps existing state.
    /// Returns true when the channel was newly added.
    pub fn enable(&mut self, channel_id: u64, guild_id: u64) -> bool {
        if self.channels.contains_key(&channel_id) {
            return false;
        }
        self.channels.insert(
            channel_id,
            ChannelState::new(channel_id, guild_id, self.window_capacity),
        );
        true
    }

    /// Stops tracking a channel, discarding its window and participants.
    /// Re-enabling later starts fresh. Returns true when the channel was
    /// tracked before the call.
    pub fn disable(&mut self, channel_id: u64) -> bool {
        self.channels.remove(&channel_id).is_some()
    }

    pub fn get(&self, channel_id: u64) -> Option<&ChannelState> {
        self.channels.get(&channel_id)
    }

    pub fn get_mut(&mut self, channel_id: u64) -> Option<&mut ChannelState> {
        self.channels.get_mut(&channel_id)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_disable_round_trip() {
        let mut registry = ChannelRegistry::new(20);
        assert!(!registry.is_tracked(100));

        assert!(registry.enable(100, 1));
        assert!(registry.is_tracked(100));

        assert!(registry.disable(100));
        assert!(!registry.is_tracked(100));
        assert!(!registry.disable(100));
    }

    #[test]
    fn test_enable_is_idempotent() {
        let mut registry = ChannelRegistry::new(20);
        assert!(registry.enable(100, 1));

        registry
            .get_mut(100)
            .unwrap()
            .participants
            .touch(1, "Alice");

        // Second enable must not reset existing state.
        assert!(!registry.enable(100, 1));
        assert_eq!(registry.get(100).unwrap().participants.len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_disable_discards_state() {
        let mut registry = ChannelRegistry::new(20);
        registry.enable(100, 1);
        registry.get_mut(100).unwrap().participants.touch(1, "Alice");

        registry.disable(100);
        registry.enable(100, 1);
        assert!(registry.get(100).unwrap().participants.is_empty());
        assert!(registry.get(100).unwrap().window.is_empty());
    }
}
