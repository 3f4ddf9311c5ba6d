//! Source location resolver: collapses ranked chunk matches into a minimal
//! set of contiguous, labeled page ranges ordered by confidence.
//!
//! The merge bridges small gaps between hit pages so two matches separated
//! only by an unretrieved page still read as one citation, and takes each
//! location's confidence from its single strongest supporting hit rather
//! than an average. Output is independent of input hit order.

use std::collections::HashMap;

use crate::config::ResolverConfig;
use crate::types::{Chunk, MatchHit, ResolvedLocation};

/// Resolves `hits` against chunk metadata into ordered citations.
///
/// Empty input yields an empty result; "no location found" is a normal
/// outcome for callers, never an error. Hits whose chunk id is absent from
/// `chunks` are skipped.
pub fn resolve(
    hits: &[MatchHit],
    chunks: &HashMap<String, Chunk>,
    config: &ResolverConfig,
) -> Vec<ResolvedLocation> {
    // Retain the strongest similarity per chunk so duplicate or reordered
    // hit lists resolve identically.
    let mut retained: HashMap<&str, (&Chunk, f32)> = HashMap::new();
    for hit in hits {
        if hit.similarity < config.min_similarity {
            continue;
        }
        let Some(chunk) = chunks.get(&hit.chunk_id) else {
            tracing::debug!(chunk_id = %hit.chunk_id, "hit references unknown chunk, skipping");
            continue;
        };
        retained
            .entry(chunk.chunk_id.as_str())
            .and_modify(|(_, similarity)| *similarity = similarity.max(hit.similarity))
            .or_insert((chunk, hit.similarity));
    }

    // Group by document, then order each group by page span for merging.
    let mut by_document: HashMap<&str, Vec<(&Chunk, f32)>> = HashMap::new();
    for (chunk, similarity) in retained.into_values() {
        by_document
            .entry(chunk.document_id.as_str())
            .or_default()
            .push((chunk, similarity));
    }

    let mut locations = Vec::new();
    for (document_id, mut group) in by_document {
        group.sort_by(|(a, _), (b, _)| {
            a.start_page
                .cmp(&b.start_page)
                .then(a.end_page.cmp(&b.end_page))
                .then(a.chunk_id.cmp(&b.chunk_id))
        });

        let mut current: Option<LocationDraft<'_>> = None;
        for (chunk, similarity) in group {
            match &mut current {
                Some(draft) if draft.bridges(chunk, config.page_gap_tolerance) => {
                    draft.absorb(chunk, similarity);
                }
                _ => {
                    if let Some(done) = current.take() {
                        locations.push(done.finish(document_id));
                    }
                    current = Some(LocationDraft::new(chunk, similarity));
                }
            }
        }
        if let Some(done) = current.take() {
            locations.push(done.finish(document_id));
        }
    }

    locations.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.document_id.cmp(&b.document_id))
            .then_with(|| a.page_start.cmp(&b.page_start))
    });
    locations.truncate(config.max_locations);
    locations
}

/// A location being accumulated during the merge pass.
struct LocationDraft<'a> {
    page_start: u32,
    page_end: u32,
    best: (&'a Chunk, f32),
    supporting: Vec<String>,
}

impl<'a> LocationDraft<'a> {
    fn new(chunk: &'a Chunk, similarity: f32) -> Self {
        Self {
            page_start: chunk.start_page,
            page_end: chunk.end_page,
            best: (chunk, similarity),
            supporting: vec![chunk.chunk_id.clone()],
        }
    }

    /// True when `chunk` is adjacent, overlapping, or within the bridgeable
    /// page gap of this draft.
    fn bridges(&self, chunk: &Chunk, gap_tolerance: u32) -> bool {
        let gap = chunk.start_page.saturating_sub(self.page_end + 1);
        gap <= gap_tolerance
    }

    fn absorb(&mut self, chunk: &'a Chunk, similarity: f32) {
        self.page_end = self.page_end.max(chunk.end_page);
        self.supporting.push(chunk.chunk_id.clone());
        let (best_chunk, best_similarity) = self.best;
        // Strict comparison keeps the earliest chunk on exact ties, which
        // is deterministic because the group is sorted.
        if similarity > best_similarity
            || (similarity == best_similarity && chunk.chunk_id < best_chunk.chunk_id)
        {
            self.best = (chunk, similarity);
        }
    }

    fn finish(self, document_id: &str) -> ResolvedLocation {
        let (best_chunk, best_similarity) = self.best;
        ResolvedLocation {
            document_id: document_id.to_string(),
            page_start: self.page_start,
            page_end: self.page_end,
            structural_context: best_chunk.structural_context.clone(),
            confidence: best_similarity,
            supporting_chunk_ids: self.supporting,
        }
    }
}
