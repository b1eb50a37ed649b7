use anyhow::Context as _;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::ContextConfig;

/// Payload stored alongside each vector. `channel_id` is a string keyword
/// field so it can carry a payload index; `timestamp` is unix seconds so
/// retention deletes can use a range filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointPayload {
    pub channel_id: String,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    pub timestamp: i64,
    pub is_bot: bool,
}

/// One record to upsert: vector + payload, keyed by the message id so
/// re-indexing after a retry is idempotent.
#[derive(Debug, Clone, Serialize)]
pub struct VectorPoint {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// A search hit straight from the store, before facade-level filtering.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub score: f32,
    pub payload: PointPayload,
}

/// Narrow contract over the vector store, mockable in tests.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates the collection (and its payload index) if absent.
    async fn ensure_collection(&self) -> anyhow::Result<()>;
    async fn upsert(&self, points: Vec<VectorPoint>) -> anyhow::Result<()>;
    async fn search(
        &self,
        vector: Vec<f32>,
        channel_id: u64,
        limit: usize,
    ) -> anyhow::Result<Vec<ScoredPoint>>;
    async fn count(&self, channel_id: u64) -> anyhow::Result<u64>;
    /// Deletes points whose payload timestamp is older than `cutoff`.
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<()>;
}

/// Qdrant REST client. Stateless facade; safe to share across tasks.
pub struct QdrantStore {
    http: reqwest::Client,
    base_url: String,
    collection: String,
    dimension: usize,
}

impl QdrantStore {
    pub fn new(config: &ContextConfig) -> anyhow::Result<Self> {
        // Every request carries a bounded timeout so an unresponsive host
        // fails into the degraded-to-empty path instead of stalling callers.
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.vector_timeout_secs))
            .build()
            .context("failed to build vector store HTTP client")?;
        Ok(Self {
            http,
            base_url: config.qdrant_url.trim_end_matches('/').to_string(),
            collection: config.collection_name.clone(),
            dimension: config.embedding_dimension,
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, suffix)
    }
}

/// Qdrant filter matching a single channel.
pub(crate) fn channel_filter(channel_id: u64) -> serde_json::Value {
    json!({
        "must": [{ "key": "channel_id", "match": { "value": channel_id.to_string() } }]
    })
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    score: f32,
    payload: PointPayload,
}

#[derive(Deserialize)]
struct CountResponse {
    result: CountResult,
}

#[derive(Deserialize)]
struct CountResult {
    count: u64,
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self) -> anyhow::Result<()> {
        let exists = self
            .http
            .get(self.collection_url(""))
            .send()
            .await
            .context("qdrant unreachable")?
            .status()
            .is_success();

        if !exists {
            let response = self
                .http
                .put(self.collection_url(""))
                .json(&json!({
                    "vectors": { "size": self.dimension, "distance": "Cosine" }
                }))
                .send()
                .await
                .context("qdrant collection create failed")?;

            // A concurrent creator winning the race is fine.
            if !response.status().is_success() && response.status() != reqwest::StatusCode::CONFLICT
            {
                let body = response.text().await.unwrap_or_default();
                if !body.contains("already exists") {
                    anyhow::bail!("qdrant collection create failed: {}", body);
                }
            }
            debug!("Created vector collection '{}'", self.collection);
        }

        // Index creation on an already-indexed field is harmless.
        let response = self
            .http
            .put(self.collection_url("/index"))
            .json(&json!({ "field_name": "channel_id", "field_schema": "keyword" }))
            .send()
            .await
            .context("qdrant payload index create failed")?;
        if !response.status().is_success() {
            debug!(
                "Payload index create returned {}, assuming it already exists",
                response.status()
            );
        }

        Ok(())
    }

    async fn upsert(&self, points: Vec<VectorPoint>) -> anyhow::Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        self.http
            .put(self.collection_url("/points?wait=true"))
            .json(&json!({ "points": points }))
            .send()
            .await
            .context("qdrant upsert failed")?
            .error_for_status()
            .context("qdrant upsert rejected")?;
        Ok(())
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        channel_id: u64,
        limit: usize,
    ) -> anyhow::Result<Vec<ScoredPoint>> {
        let response = self
            .http
            .post(self.collection_url("/points/search"))
            .json(&json!({
                "vector": vector,
                "limit": limit,
                "with_payload": true,
                "filter": channel_filter(channel_id),
            }))
            .send()
            .await
            .context("qdrant search failed")?
            .error_for_status()
            .context("qdrant search rejected")?
            .json::<SearchResponse>()
            .await
            .context("qdrant search response malformed")?;

        Ok(response
            .result
            .into_iter()
            .map(|r| ScoredPoint {
                score: r.score,
                payload: r.payload,
            })
            .collect())
    }

    async fn count(&self, channel_id: u64) -> anyhow::Result<u64> {
        let response = self
            .http
            .post(self.collection_url("/points/count"))
            .json(&json!({ "filter": channel_filter(channel_id), "exact": true }))
            .send()
            .await
            .context("qdrant count failed")?
            .error_for_status()
            .context("qdrant count rejected")?
            .json::<CountResponse>()
            .await
            .context("qdrant count response malformed")?;

        Ok(response.result.count)
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<()> {
        self.http
            .post(self.collection_url("/points/delete?wait=true"))
            .json(&json!({
                "filter": {
                    "must": [{ "key": "timestamp", "range": { "lt": cutoff.timestamp() } }]
                }
            }))
            .send()
            .await
            .context("qdrant delete failed")?
            .error_for_status()
            .context("qdrant delete rejected")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_filter_shape() {
        let filter = channel_filter(42);
        assert_eq!(
            filter,
            json!({ "must": [{ "key": "channel_id", "match": { "value": "42" } }] })
        );
    }

    #[test]
    fn test_point_serializes_to_qdrant_shape() {
        let point = VectorPoint {
            id: 7,
            vector: vec![0.5, 0.25],
            payload: PointPayload {
                channel_id: "100".to_string(),
                author_id: "1".to_string(),
                author_name: "Alice".to_string(),
                content: "hello".to_string(),
                timestamp: 1700000000,
                is_bot: false,
            },
        };

        let value = serde_json::to_value(&point).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["vector"].as_array().unwrap().len(), 2);
        assert_eq!(value["payload"]["channel_id"], "100");
        assert_eq!(value["payload"]["timestamp"], 1700000000i64);
    }

    #[tokio::test]
    async fn test_search_fails_bounded_against_unresponsive_host() {
        // A host that accepts connections but never answers must produce an
        // error within the configured request timeout, not a hang.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                if let Ok((socket, _)) = listener.accept().await {
                    held.push(socket);
                }
            }
        });

        let config = ContextConfig {
            qdrant_url: format!("http://{}", addr),
            vector_timeout_secs: 1,
            ..Default::default()
        };
        let store = QdrantStore::new(&config).unwrap();

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            store.search(vec![0.1, 0.2], 100, 5),
        )
        .await
        .expect("search must fail within the request timeout, not hang");
        assert!(result.is_err());
    }

    #[test]
    fn test_search_response_parses() {
        let raw = r#"{
            "result": [
                { "id": 7, "version": 0, "score": 0.87,
                  "payload": { "channel_id": "100", "author_id": "1",
                               "author_name": "Alice", "content": "hello",
                               "timestamp": 1700000000, "is_bot": false } }
            ],
            "status": "ok", "time": 0.001
        }"#;

        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.result.len(), 1);
        assert!((parsed.result[0].score - 0.87).abs() < f32::EPSILON);
        assert_eq!(parsed.result[0].payload.author_name, "Alice");
    }
}
