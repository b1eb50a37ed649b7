use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single chat message as recorded by the engine.
///
/// Immutable once recorded; ids are platform snowflakes (u64).
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub id: u64,
    pub channel_id: u64,
    pub guild_id: u64,
    pub author_id: u64,
    pub author_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_bot: bool,
    pub reply_to_id: Option<u64>,
}

/// Projection of a message queued for vector indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: u64,
    pub channel_id: u64,
    pub author_id: u64,
    pub author_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_bot: bool,
}

impl From<&ChannelMessage> for IndexEntry {
    fn from(msg: &ChannelMessage) -> Self {
        Self {
            id: msg.id,
            channel_id: msg.channel_id,
            author_id: msg.author_id,
            author_name: msg.author_name.clone(),
            content: msg.content.clone(),
            timestamp: msg.timestamp,
            is_bot: msg.is_bot,
        }
    }
}
