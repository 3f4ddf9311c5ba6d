//! In-memory vector store behind a read-write lock.
//!
//! Chunk metadata and embeddings live in one map guarded by a single
//! `parking_lot::RwLock`: queries take read guards and may interleave
//! freely, while insert/remove take the write guard. Snapshots persist the
//! paired metadata and vectors atomically in one JSON document so a reload
//! can never produce a dangling chunk reference.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::fs;

use super::{VectorStore, cosine_similarity};
use crate::types::{Chunk, LocatorError, MatchHit};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Entry {
    chunk: Chunk,
    embedding: Vec<f32>,
}

#[derive(Default)]
struct IndexState {
    /// BTreeMap keeps iteration in ascending chunk id order, which is the
    /// deterministic tie-break for equal similarities.
    entries: BTreeMap<String, Entry>,
    dimensions: Option<usize>,
}

/// Serialized snapshot: chunk metadata and embeddings together, never split.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    dimensions: Option<usize>,
    entries: Vec<Entry>,
}

/// Process-owned index over all documents. Cheap to clone; clones share the
/// same underlying state.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<IndexState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes the full index to `path` via a temp-file rename, keeping the
    /// metadata/vector pair consistent even across a crash mid-write.
    pub async fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), LocatorError> {
        let snapshot = {
            let state = self.state.read();
            Snapshot {
                version: SNAPSHOT_VERSION,
                dimensions: state.dimensions,
                entries: state.entries.values().cloned().collect(),
            }
        };
        let serialized = serde_json::to_vec(&snapshot)?;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, &serialized).await?;
        fs::rename(&tmp_path, path).await?;
        tracing::info!(
            path = %path.display(),
            chunks = snapshot.entries.len(),
            "saved index snapshot"
        );
        Ok(())
    }

    /// Rebuilds a store from a snapshot written by
    /// [`save_snapshot`](Self::save_snapshot).
    pub async fn load_snapshot(path: impl AsRef<Path>) -> Result<Self, LocatorError> {
        let data = fs::read(path.as_ref()).await?;
        let snapshot: Snapshot = serde_json::from_slice(&data)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(LocatorError::Storage(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        let mut entries = BTreeMap::new();
        for entry in snapshot.entries {
            entries.insert(entry.chunk.chunk_id.clone(), entry);
        }
        tracing::info!(chunks = entries.len(), "loaded index snapshot");
        Ok(Self {
            state: Arc::new(RwLock::new(IndexState {
                entries,
                dimensions: snapshot.dimensions,
            })),
        })
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn insert(&self, chunk: Chunk, embedding: Vec<f32>) -> Result<(), LocatorError> {
        let mut state = self.state.write();
        if state.entries.contains_key(&chunk.chunk_id) {
            return Err(LocatorError::DuplicateChunk(chunk.chunk_id));
        }
        match state.dimensions {
            Some(dimensions) if dimensions != embedding.len() => {
                return Err(LocatorError::Storage(format!(
                    "embedding dimension {} does not match index dimension {dimensions}",
                    embedding.len()
                )));
            }
            None => state.dimensions = Some(embedding.len()),
            Some(_) => {}
        }
        state
            .entries
            .insert(chunk.chunk_id.clone(), Entry { chunk, embedding });
        Ok(())
    }

    async fn remove_document(&self, document_id: &str) -> Result<usize, LocatorError> {
        let mut state = self.state.write();
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| entry.chunk.document_id != document_id);
        let removed = before - state.entries.len();
        if removed > 0 {
            tracing::debug!(%document_id, removed, "removed document from index");
        }
        Ok(removed)
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        document_filter: Option<&str>,
    ) -> Result<Vec<MatchHit>, LocatorError> {
        if k == 0 {
            return Err(LocatorError::InvalidRequest(
                "query k must be at least 1".to_string(),
            ));
        }
        let state = self.state.read();
        if let Some(dimensions) = state.dimensions {
            if embedding.len() != dimensions {
                return Err(LocatorError::InvalidRequest(format!(
                    "query embedding dimension {} does not match index dimension {dimensions}",
                    embedding.len()
                )));
            }
        }

        let mut hits: Vec<MatchHit> = state
            .entries
            .values()
            .filter(|entry| {
                document_filter.is_none_or(|filter| entry.chunk.document_id == filter)
            })
            .map(|entry| MatchHit {
                chunk_id: entry.chunk.chunk_id.clone(),
                similarity: cosine_similarity(embedding, &entry.embedding),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn get_chunk(&self, chunk_id: &str) -> Result<Option<Chunk>, LocatorError> {
        let state = self.state.read();
        Ok(state.entries.get(chunk_id).map(|entry| entry.chunk.clone()))
    }

    async fn count(&self) -> Result<usize, LocatorError> {
        Ok(self.state.read().entries.len())
    }

    async fn document_ids(&self) -> Result<Vec<String>, LocatorError> {
        let state = self.state.read();
        let mut ids: Vec<String> = state
            .entries
            .values()
            .map(|entry| entry.chunk.document_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StructuralContext;

    fn chunk(id: &str, document_id: &str, page: u32) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            document_id: document_id.to_string(),
            text: format!("chunk {id}"),
            start_page: page,
            end_page: page,
            structural_context: StructuralContext::default(),
        }
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = InMemoryStore::new();
        store
            .insert(chunk("doc#c00000", "doc", 1), vec![1.0, 0.0])
            .await
            .unwrap();
        let err = store
            .insert(chunk("doc#c00000", "doc", 1), vec![0.0, 1.0])
            .await
            .unwrap_err();
        assert!(matches!(err, LocatorError::DuplicateChunk(_)));
        // The original entry survives.
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_a_storage_error() {
        let store = InMemoryStore::new();
        store
            .insert(chunk("a", "doc", 1), vec![1.0, 0.0])
            .await
            .unwrap();
        let err = store
            .insert(chunk("b", "doc", 2), vec![1.0, 0.0, 0.0])
            .await
            .unwrap_err();
        assert!(matches!(err, LocatorError::Storage(_)));
    }

    #[tokio::test]
    async fn remove_document_is_idempotent() {
        let store = InMemoryStore::new();
        store
            .insert(chunk("a#c00000", "a", 1), vec![1.0, 0.0])
            .await
            .unwrap();
        store
            .insert(chunk("b#c00000", "b", 1), vec![0.0, 1.0])
            .await
            .unwrap();

        assert_eq!(store.remove_document("a").await.unwrap(), 1);
        assert_eq!(store.remove_document("a").await.unwrap(), 0);
        assert_eq!(store.remove_document("missing").await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.document_ids().await.unwrap(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn query_orders_by_similarity_then_chunk_id() {
        let store = InMemoryStore::new();
        store
            .insert(chunk("doc#c00002", "doc", 3), vec![1.0, 0.0])
            .await
            .unwrap();
        store
            .insert(chunk("doc#c00000", "doc", 1), vec![1.0, 0.0])
            .await
            .unwrap();
        store
            .insert(chunk("doc#c00001", "doc", 2), vec![0.0, 1.0])
            .await
            .unwrap();

        let hits = store.query(&[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(hits.len(), 3);
        // Two identical similarities break ties by ascending id.
        assert_eq!(hits[0].chunk_id, "doc#c00000");
        assert_eq!(hits[1].chunk_id, "doc#c00002");
        assert_eq!(hits[2].chunk_id, "doc#c00001");
        assert!(hits[0].similarity > hits[2].similarity);
    }

    #[tokio::test]
    async fn query_k_rules() {
        let store = InMemoryStore::new();
        store
            .insert(chunk("doc#c00000", "doc", 1), vec![1.0, 0.0])
            .await
            .unwrap();

        let err = store.query(&[1.0, 0.0], 0, None).await.unwrap_err();
        assert!(matches!(err, LocatorError::InvalidRequest(_)));

        // k beyond the corpus size returns everything, not an error.
        let hits = store.query(&[1.0, 0.0], 50, None).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn query_respects_document_filter() {
        let store = InMemoryStore::new();
        store
            .insert(chunk("a#c00000", "a", 1), vec![1.0, 0.0])
            .await
            .unwrap();
        store
            .insert(chunk("b#c00000", "b", 1), vec![1.0, 0.0])
            .await
            .unwrap();

        let hits = store.query(&[1.0, 0.0], 10, Some("a")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "a#c00000");
    }

    #[tokio::test]
    async fn removed_document_never_appears_in_queries() {
        let store = InMemoryStore::new();
        for i in 0..4 {
            store
                .insert(chunk(&format!("a#c0000{i}"), "a", i + 1), vec![1.0, 0.0])
                .await
                .unwrap();
        }
        store
            .insert(chunk("b#c00000", "b", 1), vec![1.0, 0.0])
            .await
            .unwrap();

        store.remove_document("a").await.unwrap();
        let hits = store.query(&[1.0, 0.0], 10, None).await.unwrap();
        assert!(hits.iter().all(|hit| !hit.chunk_id.starts_with("a#")));
    }

    #[tokio::test]
    async fn snapshot_round_trip_preserves_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let store = InMemoryStore::new();
        store
            .insert(chunk("doc#c00000", "doc", 1), vec![0.6, 0.8])
            .await
            .unwrap();
        store
            .insert(chunk("doc#c00001", "doc", 2), vec![1.0, 0.0])
            .await
            .unwrap();
        store.save_snapshot(&path).await.unwrap();

        let reloaded = InMemoryStore::load_snapshot(&path).await.unwrap();
        assert_eq!(reloaded.count().await.unwrap(), 2);
        let hits = reloaded.query(&[0.6, 0.8], 1, None).await.unwrap();
        assert_eq!(hits[0].chunk_id, "doc#c00000");
        let metadata = reloaded.get_chunk("doc#c00001").await.unwrap().unwrap();
        assert_eq!(metadata.start_page, 2);
    }
}
