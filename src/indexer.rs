use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::{debug, error, warn};

use crate::embeddings::EmbeddingProvider;
use crate::message::IndexEntry;
use crate::vector::{PointPayload, VectorPoint, VectorStore};

/// A semantic search result ready for context formatting.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub author_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub score: f32,
}

/// Facade tying the embedding provider to the vector store: batch indexing,
/// filtered search, live counts and retention pruning.
///
/// External failures never propagate: a failed batch is logged and dropped
/// for the cycle, a failed search degrades to no results. The in-memory
/// recent window keeps serving recency context either way.
pub struct VectorIndexClient {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl VectorIndexClient {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    pub async fn ensure_ready(&self) -> anyhow::Result<()> {
        self.store.ensure_collection().await
    }

    /// Embeds and upserts a drained batch. Returns how many entries made it
    /// into the store. Point ids are the message ids, so re-running a batch
    /// after a partial failure is safe.
    pub async fn index_batch(&self, entries: Vec<IndexEntry>) -> usize {
        let mut points = Vec::with_capacity(entries.len());
        for entry in entries {
            // Skip very short messages to reduce embedding noise/cost.
            if entry.content.trim().len() < 3 {
                continue;
            }

            match self.embedder.embed(&entry.content).await {
                Ok(vector) => points.push(VectorPoint {
                    id: entry.id,
                    vector,
                    payload: PointPayload {
                        channel_id: entry.channel_id.to_string(),
                        author_id: entry.author_id.to_string(),
                        author_name: entry.author_name,
                        content: entry.content,
                        timestamp: entry.timestamp.timestamp(),
                        is_bot: entry.is_bot,
                    },
                }),
                Err(e) => {
                    debug!("Indexer: failed to embed message {}: {}", entry.id, e);
                }
            }
        }

        if points.is_empty() {
            return 0;
        }

        let indexed = points.len();
        match self.store.upsert(points).await {
            Ok(()) => indexed,
            Err(e) => {
                error!("Indexer: upsert of {} points failed: {}", indexed, e);
                0
            }
        }
    }

    /// Similarity search scoped to one channel. Results are score-filtered,
    /// best first, at most `limit` of them. Empty on any provider failure.
    pub async fn search(
        &self,
        query: &str,
        channel_id: u64,
        limit: usize,
        score_threshold: f32,
    ) -> Vec<SearchHit> {
        let vector = match self.embedder.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                debug!("Search: failed to embed query: {}", e);
                return Vec::new();
            }
        };

        let results = match self.store.search(vector, channel_id, limit).await {
            Ok(r) => r,
            Err(e) => {
                debug!("Search: vector store query failed: {}", e);
                return Vec::new();
            }
        };

        let mut hits: Vec<SearchHit> = results
            .into_iter()
            .filter(|r| r.score >= score_threshold)
            .map(|r| SearchHit {
                author_name: r.payload.author_name,
                content: r.payload.content,
                timestamp: Utc
                    .timestamp_opt(r.payload.timestamp, 0)
                    .single()
                    .unwrap_or_else(Utc::now),
                score: r.score,
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        hits
    }

    /// Live indexed-point count for one channel; 0 when the store is away.
    pub async fn indexed_count(&self, channel_id: u64) -> u64 {
        match self.store.count(channel_id).await {
            Ok(n) => n,
            Err(e) => {
                debug!("Stats: vector count failed: {}", e);
                0
            }
        }
    }

    /// Deletes points older than the retention horizon. Housekeeping only,
    /// never on the recording hot path.
    pub async fn prune_older_than(&self, retention_days: u32) {
        let cutoff = Utc::now() - Duration::days(retention_days as i64);
        if let Err(e) = self.store.delete_before(cutoff).await {
            warn!("Retention: pruning points before {} failed: {}", cutoff, e);
        }
    }
}
