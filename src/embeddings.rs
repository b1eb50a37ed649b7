use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client};
use async_trait::async_trait;
use tokio::time::Duration;

use crate::config::ContextConfig;

/// Produces a fixed-dimension embedding vector for a piece of text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Embedding client for any OpenAI-compatible endpoint (including local
/// llama.cpp-style servers). Calls are bounded by the configured timeout so
/// a slow provider degrades instead of stalling context assembly.
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAiEmbedder {
    pub fn new(config: &ContextConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_base(&config.embedding_url);

        if let Some(key) = &config.embedding_api_key {
            openai_config = openai_config.with_api_key(key);
        } else {
            openai_config = openai_config.with_api_key("unused");
        }

        Self {
            client: Client::with_config(openai_config),
            model: config.embedding_model.clone(),
            timeout: Duration::from_secs(config.embedding_timeout_secs),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(text)
            .build()?;

        let response =
            tokio::time::timeout(self.timeout, self.client.embeddings().create(request))
                .await
                .map_err(|_| {
                    anyhow::anyhow!("embedding request timed out after {:?}", self.timeout)
                })??;

        let embedding = response
            .data
            .first()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))?
            .embedding
            .clone();

        Ok(embedding)
    }
}
