//! Channel conversation-context engine.
//!
//! Maintains a bounded window of recent messages per tracked channel,
//! batch-indexes messages into a vector store for semantic search, tracks
//! active participants, and assembles a hybrid context string for LLM
//! prompt building.

pub mod config;
pub mod context;
pub mod db;
pub mod embeddings;
pub mod indexer;
pub mod message;
pub mod participants;
pub mod queue;
pub mod registry;
pub mod service;
pub mod vector;
pub mod window;

pub use config::ContextConfig;
pub use indexer::SearchHit;
pub use message::ChannelMessage;
pub use service::{ChannelStats, ContextService};
