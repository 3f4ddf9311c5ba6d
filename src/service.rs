//! Query orchestrator: composes embedding, index query, and location
//! resolution per request, with optional best-effort tone polishing.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::embeddings::EmbeddingProvider;
use crate::polish::TonePolisher;
use crate::resolve::resolve;
use crate::stores::VectorStore;
use crate::types::{Chunk, LocatorError, ResolvedLocation};

/// Excerpts handed to the polisher are capped to keep prompts bounded.
const MAX_POLISH_EXCERPTS: usize = 6;

/// One incoming query.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocateRequest {
    pub query: String,
    /// Restrict matching to a single document.
    #[serde(default)]
    pub document_filter: Option<String>,
    /// Run the tone polisher over the resolved citations.
    #[serde(default)]
    pub polish: bool,
}

impl LocateRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            document_filter: None,
            polish: false,
        }
    }

    #[must_use]
    pub fn with_document_filter(mut self, document_id: impl Into<String>) -> Self {
        self.document_filter = Some(document_id.into());
        self
    }

    #[must_use]
    pub fn with_polish(mut self, polish: bool) -> Self {
        self.polish = polish;
        self
    }
}

/// Query outcome. An empty `locations` list is the explicit "no location
/// found" answer, distinguished from failure.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocateResponse {
    pub locations: Vec<ResolvedLocation>,
    /// Present only when polishing was requested and succeeded.
    pub summary: Option<String>,
}

/// The assembled engine: store, embedder, optional polisher, and config,
/// shared across concurrent requests.
///
/// The store is passed in explicitly rather than reached through a
/// process-wide singleton, so several engines over different indexes can
/// coexist in one process.
#[derive(Clone)]
pub struct LocatorService {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    polisher: Option<Arc<dyn TonePolisher>>,
    config: EngineConfig,
}

impl LocatorService {
    pub fn builder() -> LocatorServiceBuilder {
        LocatorServiceBuilder::default()
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Answers one query: embed, search, resolve, then optionally polish.
    ///
    /// Errors on the mandatory path (embedding, index query) abort the
    /// query. Polishing failures are logged and swallowed; the locations
    /// are returned regardless.
    pub async fn locate(&self, request: LocateRequest) -> Result<LocateResponse, LocatorError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(LocatorError::InvalidRequest(
                "query text must not be empty".to_string(),
            ));
        }

        let embedding = self.embedder.embed(query).await?;
        let hits = self
            .store
            .query(
                &embedding,
                self.config.query_top_k.max(1),
                request.document_filter.as_deref(),
            )
            .await?;
        tracing::debug!(query, hits = hits.len(), "vector search complete");

        let mut chunk_metadata: HashMap<String, Chunk> = HashMap::new();
        for hit in &hits {
            if let Some(chunk) = self.store.get_chunk(&hit.chunk_id).await? {
                chunk_metadata.insert(hit.chunk_id.clone(), chunk);
            }
        }

        let locations = resolve(&hits, &chunk_metadata, &self.config.resolver);
        tracing::debug!(query, locations = locations.len(), "locations resolved");

        let summary = if request.polish && !locations.is_empty() {
            self.polish_locations(query, &locations, &chunk_metadata).await
        } else {
            None
        };

        Ok(LocateResponse { locations, summary })
    }

    async fn polish_locations(
        &self,
        query: &str,
        locations: &[ResolvedLocation],
        chunk_metadata: &HashMap<String, Chunk>,
    ) -> Option<String> {
        let polisher = self.polisher.as_ref()?;
        let excerpts: Vec<String> = locations
            .iter()
            .flat_map(|location| location.supporting_chunk_ids.iter())
            .filter_map(|chunk_id| chunk_metadata.get(chunk_id))
            .map(|chunk| chunk.text.clone())
            .take(MAX_POLISH_EXCERPTS)
            .collect();

        match polisher.polish(query, locations, &excerpts).await {
            Ok(summary) => Some(summary),
            Err(err) => {
                // Best-effort path: degrade to the raw locations.
                tracing::warn!(error = %err, "tone polishing failed, returning raw locations");
                None
            }
        }
    }
}

/// Builder for [`LocatorService`], following the crate's builder convention.
#[derive(Default)]
pub struct LocatorServiceBuilder {
    store: Option<Arc<dyn VectorStore>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    polisher: Option<Arc<dyn TonePolisher>>,
    config: Option<EngineConfig>,
}

impl LocatorServiceBuilder {
    #[must_use]
    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn embedding_provider(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    #[must_use]
    pub fn polisher(mut self, polisher: Arc<dyn TonePolisher>) -> Self {
        self.polisher = Some(polisher);
        self
    }

    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the service.
    ///
    /// # Panics
    ///
    /// Panics if the store or embedding provider was not set; use
    /// [`try_build`](Self::try_build) for a fallible variant.
    pub fn build(self) -> LocatorService {
        self.try_build()
            .expect("LocatorServiceBuilder requires a store and an embedding provider")
    }

    /// Builds the service, returning `None` when a required collaborator is
    /// missing.
    pub fn try_build(self) -> Option<LocatorService> {
        Some(LocatorService {
            store: self.store?,
            embedder: self.embedder?,
            polisher: self.polisher,
            config: self.config.unwrap_or_else(EngineConfig::standard),
        })
    }
}
