//! Storage backends for chunk metadata and embedding vectors.
//!
//! The [`VectorStore`] trait is the single seam between the pipeline and the
//! index backend: ingestion inserts chunk/embedding pairs, queries run top-k
//! similarity search, and the resolver reads chunk metadata back by id. The
//! store exclusively owns the chunk_id ↔ embedding ↔ metadata mapping; the
//! resolver and orchestrator only ever read it.
//!
//! ```text
//!              ┌──────────────────┐
//!              │ VectorStore trait│
//!              │   (async CRUD)   │
//!              └────────┬─────────┘
//!                       │
//!                       ▼
//!              ┌──────────────────┐
//!              │  InMemoryStore   │
//!              │ RwLock + cosine  │
//!              └──────────────────┘
//! ```
//!
//! Concurrency contract: `query` calls may interleave freely, while
//! `insert`/`remove_document` are mutually exclusive with each other and
//! with in-flight queries, so a returned hit can never reference a chunk
//! removed before the query observed the index.

pub mod memory;

use async_trait::async_trait;

use crate::types::{Chunk, LocatorError, MatchHit};

pub use memory::InMemoryStore;

/// Unified interface over vector index backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Adds a chunk/embedding pair. Fails with
    /// [`LocatorError::DuplicateChunk`] when the id is already present;
    /// never silently overwrites.
    async fn insert(&self, chunk: Chunk, embedding: Vec<f32>) -> Result<(), LocatorError>;

    /// Removes every chunk and vector belonging to `document_id`, returning
    /// the number removed. Idempotent: removing an absent document is a
    /// no-op, not an error.
    async fn remove_document(&self, document_id: &str) -> Result<usize, LocatorError>;

    /// Top-k similarity search, sorted by similarity descending with ties
    /// broken by ascending chunk id. `k` must be at least 1; a `k` larger
    /// than the corpus returns all available hits.
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        document_filter: Option<&str>,
    ) -> Result<Vec<MatchHit>, LocatorError>;

    /// Reads back chunk metadata for a hit.
    async fn get_chunk(&self, chunk_id: &str) -> Result<Option<Chunk>, LocatorError>;

    /// Total number of indexed chunks.
    async fn count(&self) -> Result<usize, LocatorError>;

    /// Distinct document ids currently indexed, sorted.
    async fn document_ids(&self) -> Result<Vec<String>, LocatorError>;
}

/// Cosine similarity over same-length vectors; zero for degenerate input.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
