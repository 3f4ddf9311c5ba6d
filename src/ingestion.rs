//! Build-time pipeline: extracted pages in, indexed chunk/embedding pairs
//! out.
//!
//! Each document flows through structure detection, chunking, embedding,
//! and insertion as one unit. Batch ingestion isolates failures per
//! document: one corrupt upload never aborts its siblings.

use uuid::Uuid;

use crate::chunking::chunk_pages;
use crate::config::EngineConfig;
use crate::embeddings::EmbeddingProvider;
use crate::stores::VectorStore;
use crate::structure::{Outline, StructureDetector};
use crate::types::{LocatorError, Page};

/// Summary of a completed document ingestion.
#[derive(Clone, Debug)]
pub struct IngestReport {
    pub ingest_id: Uuid,
    pub document_id: String,
    pub chunk_count: usize,
    /// Chunks dropped because the provider returned an empty embedding.
    pub skipped_chunks: usize,
}

fn ingestion_error(document_id: &str, reason: impl Into<String>) -> LocatorError {
    LocatorError::Ingestion {
        document_id: document_id.to_string(),
        reason: reason.into(),
    }
}

/// Ingests one document's pages: detect structure, chunk, embed, insert.
///
/// Pages must belong to a single document and arrive in ascending page
/// order. Re-ingesting an existing document id replaces its previous
/// chunks. A document whose pages contain no text succeeds with zero
/// chunks.
pub async fn ingest_document(
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingProvider,
    pages: &[Page],
    config: &EngineConfig,
) -> Result<IngestReport, LocatorError> {
    let Some(first) = pages.first() else {
        return Err(ingestion_error("<empty>", "document has no pages"));
    };
    let document_id = first.document_id.clone();
    if let Some(stray) = pages.iter().find(|page| page.document_id != document_id) {
        return Err(ingestion_error(
            &document_id,
            format!(
                "page {} belongs to document '{}'",
                stray.page_number, stray.document_id
            ),
        ));
    }

    let ingest_id = Uuid::new_v4();
    let replaced = store.remove_document(&document_id).await?;
    if replaced > 0 {
        tracing::info!(%document_id, replaced, "replacing previously indexed document");
    }

    let outline = Outline::new(StructureDetector::new().detect(pages));
    let chunks = chunk_pages(pages, &outline, &config.chunking);
    if chunks.is_empty() {
        tracing::info!(%document_id, %ingest_id, "document produced no chunks");
        return Ok(IngestReport {
            ingest_id,
            document_id,
            chunk_count: 0,
            skipped_chunks: 0,
        });
    }

    let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
    let embeddings = embedder
        .embed_batch(&texts)
        .await
        .map_err(|err| ingestion_error(&document_id, err.to_string()))?;
    if embeddings.len() != chunks.len() {
        return Err(ingestion_error(
            &document_id,
            format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            ),
        ));
    }

    let mut inserted = 0usize;
    let mut skipped = 0usize;
    for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
        if embedding.is_empty() {
            skipped += 1;
            continue;
        }
        store.insert(chunk, embedding).await?;
        inserted += 1;
    }

    tracing::info!(
        %document_id,
        %ingest_id,
        chunks = inserted,
        skipped,
        headings = outline.headings().len(),
        "document ingested"
    );
    Ok(IngestReport {
        ingest_id,
        document_id,
        chunk_count: inserted,
        skipped_chunks: skipped,
    })
}

/// Ingests several documents with per-document failure isolation: the
/// result list is positionally aligned with `documents`, and an `Err` entry
/// never prevents later documents from being processed.
pub async fn ingest_batch(
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingProvider,
    documents: Vec<Vec<Page>>,
    config: &EngineConfig,
) -> Vec<Result<IngestReport, LocatorError>> {
    let mut reports = Vec::with_capacity(documents.len());
    for pages in documents {
        let report = ingest_document(store, embedder, &pages, config).await;
        if let Err(err) = &report {
            tracing::warn!(error = %err, "document ingestion failed, continuing batch");
        }
        reports.push(report);
    }
    reports
}
