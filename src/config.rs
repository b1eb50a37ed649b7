use dotenvy::dotenv;
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
}

/// Configuration for the context engine, sourced from the environment with
/// defaults for everything except credentials.
#[derive(Clone)]
pub struct ContextConfig {
    /// Master switch; a disabled engine refuses to start.
    pub enabled: bool,
    /// Capacity of the per-channel recent-message window.
    pub recent_message_count: usize,
    /// Period of the batch indexing flush.
    pub batch_index_interval_minutes: u64,
    /// Age after which indexed points become eligible for deletion.
    pub retention_days: u32,
    /// Minimum similarity score for a search hit to be kept.
    pub search_score_threshold: f32,
    /// Maximum semantic search results per query.
    pub semantic_search_limit: usize,
    pub collection_name: String,
    pub embedding_url: String,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
    pub embedding_dimension: usize,
    pub embedding_timeout_secs: u64,
    pub qdrant_url: String,
    /// Request timeout for vector-store calls; a dead Qdrant host must
    /// degrade search to empty, not stall context assembly.
    pub vector_timeout_secs: u64,
    pub database_url: String,
    /// Default lookback for "active participant" listings.
    pub participant_window_minutes: i64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recent_message_count: 50,
            batch_index_interval_minutes: 5,
            retention_days: 90,
            search_score_threshold: 0.4,
            semantic_search_limit: 5,
            collection_name: "channel_messages".to_string(),
            embedding_url: "http://localhost:8080/v1".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_api_key: None,
            embedding_dimension: 1536,
            embedding_timeout_secs: 30,
            qdrant_url: "http://localhost:6333".to_string(),
            vector_timeout_secs: 30,
            database_url: "data/memcord.db".to_string(),
            participant_window_minutes: 30,
        }
    }
}

impl ContextConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let config = Self {
            enabled: env_parse("CONTEXT_ENABLED", defaults.enabled),
            recent_message_count: env_parse("RECENT_MESSAGE_COUNT", defaults.recent_message_count),
            batch_index_interval_minutes: env_parse(
                "BATCH_INDEX_INTERVAL_MINUTES",
                defaults.batch_index_interval_minutes,
            ),
            retention_days: env_parse("RETENTION_DAYS", defaults.retention_days),
            search_score_threshold: env_parse(
                "SEARCH_SCORE_THRESHOLD",
                defaults.search_score_threshold,
            ),
            semantic_search_limit: env_parse(
                "SEMANTIC_SEARCH_LIMIT",
                defaults.semantic_search_limit,
            ),
            collection_name: env::var("VECTOR_COLLECTION").unwrap_or(defaults.collection_name),
            embedding_url: env::var("EMBEDDING_URL").unwrap_or(defaults.embedding_url),
            embedding_model: env::var("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            embedding_api_key: env::var("EMBEDDING_API_KEY").ok(),
            embedding_dimension: env_parse("EMBEDDING_DIMENSION", defaults.embedding_dimension),
            embedding_timeout_secs: env_parse(
                "EMBEDDING_TIMEOUT_SECS",
                defaults.embedding_timeout_secs,
            ),
            qdrant_url: env::var("QDRANT_URL").unwrap_or(defaults.qdrant_url),
            vector_timeout_secs: env_parse("VECTOR_TIMEOUT_SECS", defaults.vector_timeout_secs),
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            participant_window_minutes: env_parse(
                "PARTICIPANT_WINDOW_MINUTES",
                defaults.participant_window_minutes,
            ),
        };
        config.validate()?;
        Ok(config)
    }

    /// Fails fast on values that would make the engine nonsensical.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recent_message_count == 0 {
            return Err(ConfigError::ZeroValue("RECENT_MESSAGE_COUNT"));
        }
        if self.batch_index_interval_minutes == 0 {
            return Err(ConfigError::ZeroValue("BATCH_INDEX_INTERVAL_MINUTES"));
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::ZeroValue("EMBEDDING_DIMENSION"));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl std::fmt::Debug for ContextConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextConfig")
            .field("enabled", &self.enabled)
            .field("recent_message_count", &self.recent_message_count)
            .field(
                "batch_index_interval_minutes",
                &self.batch_index_interval_minutes,
            )
            .field("retention_days", &self.retention_days)
            .field("search_score_threshold", &self.search_score_threshold)
            .field("semantic_search_limit", &self.semantic_search_limit)
            .field("collection_name", &self.collection_name)
            .field("embedding_url", &self.embedding_url)
            .field("embedding_model", &self.embedding_model)
            .field(
                "embedding_api_key",
                &self.embedding_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("embedding_dimension", &self.embedding_dimension)
            .field("embedding_timeout_secs", &self.embedding_timeout_secs)
            .field("qdrant_url", &self.qdrant_url)
            .field("vector_timeout_secs", &self.vector_timeout_secs)
            .field("database_url", &self.database_url)
            .field(
                "participant_window_minutes",
                &self.participant_window_minutes,
            )
            .finish()
    }
}
