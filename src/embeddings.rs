//! Embedding collaborator seam.
//!
//! The engine treats embedding as an opaque `embed(text) -> vector` call.
//! [`HttpEmbeddingProvider`] talks to a local model server;
//! [`MockEmbeddingProvider`] produces deterministic hashed bag-of-words
//! vectors so tests get meaningful similarity without a model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::types::LocatorError;

/// Async source of fixed-length embedding vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LocatorError>;

    /// Embeds several texts. The default implementation loops over
    /// [`embed`](Self::embed); providers with a batch endpoint override it.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LocatorError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Provider backed by an Ollama-compatible `/api/embeddings` endpoint.
///
/// Any transport or protocol failure maps to
/// [`LocatorError::EmbeddingUnavailable`]; there is deliberately no keyword
/// fallback when the model is unreachable.
#[derive(Clone)]
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl HttpEmbeddingProvider {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn with_client(client: reqwest::Client, config: EmbeddingConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LocatorError> {
        let url = format!("{}/api/embeddings", self.config.endpoint.trim_end_matches('/'));
        let request = EmbeddingRequest {
            model: &self.config.model,
            prompt: text,
        };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| LocatorError::EmbeddingUnavailable(err.to_string()))?
            .error_for_status()
            .map_err(|err| LocatorError::EmbeddingUnavailable(err.to_string()))?;
        let payload: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| LocatorError::EmbeddingUnavailable(err.to_string()))?;
        if payload.embedding.is_empty() {
            return Err(LocatorError::EmbeddingUnavailable(
                "embedding endpoint returned an empty vector".to_string(),
            ));
        }
        Ok(payload.embedding)
    }
}

/// Deterministic test double: tokens are hashed into a fixed number of
/// buckets, so texts sharing vocabulary land near each other in cosine
/// space while unrelated texts stay close to orthogonal.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self { dimensions: 64 }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LocatorError> {
        Ok(self.embed_sync(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn mock_embeddings_are_deterministic() {
        let provider = MockEmbeddingProvider::new();
        let first = provider.embed("quantum mechanics").await.unwrap();
        let second = provider.embed("quantum mechanics").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn mock_embeddings_reflect_shared_vocabulary() {
        let provider = MockEmbeddingProvider::new();
        let query = provider.embed("quantum mechanics").await.unwrap();
        let related = provider
            .embed("quantum mechanics describes the wave function of quantum systems")
            .await
            .unwrap();
        let unrelated = provider
            .embed("medieval agriculture relied on crop rotation and oxen")
            .await
            .unwrap();
        assert!(
            cosine(&query, &related) > cosine(&query, &unrelated),
            "shared vocabulary should raise similarity"
        );
    }

    #[tokio::test]
    async fn http_provider_parses_embedding_payload() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/embeddings");
            then.status(200)
                .json_body(serde_json::json!({ "embedding": [0.1, 0.2, 0.3] }));
        });

        let provider = HttpEmbeddingProvider::new(EmbeddingConfig {
            endpoint: server.base_url(),
            model: "test-model".to_string(),
        });
        let embedding = provider.embed("hello").await.unwrap();
        assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
        mock.assert();
    }

    #[tokio::test]
    async fn http_provider_maps_failure_to_unavailable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/embeddings");
            then.status(503);
        });

        let provider = HttpEmbeddingProvider::new(EmbeddingConfig {
            endpoint: server.base_url(),
            model: "test-model".to_string(),
        });
        let err = provider.embed("hello").await.unwrap_err();
        assert!(matches!(err, LocatorError::EmbeddingUnavailable(_)));
    }
}
