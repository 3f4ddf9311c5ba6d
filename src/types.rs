//! Core domain types shared across the locator pipeline.
//!
//! The types here follow the flow of data through the crate: extracted
//! [`Page`]s are classified into [`StructuralHeading`]s, partitioned into
//! [`Chunk`]s, matched at query time as [`MatchHit`]s, and finally collapsed
//! into [`ResolvedLocation`] citations.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Crate-wide error type.
///
/// `NoLocationFound` is deliberately absent: an empty set of resolved
/// locations is a valid query outcome, not an error.
#[derive(Debug, Error)]
pub enum LocatorError {
    /// Per-document ingestion failure. Never aborts sibling documents in a
    /// batch upload.
    #[error("ingestion failed for document '{document_id}': {reason}")]
    Ingestion { document_id: String, reason: String },

    /// A chunk id was inserted twice. Indicates a chunk id generation bug;
    /// the store never silently overwrites.
    #[error("duplicate chunk id '{0}'")]
    DuplicateChunk(String),

    /// The external embedding collaborator could not be reached or returned
    /// an unusable response. There is no keyword-matching fallback.
    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Vector/metadata store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// The optional tone-polishing collaborator failed. Callers on the query
    /// path swallow and log this; resolved locations are still returned.
    #[error("polishing failed: {0}")]
    Polishing(String),

    /// A caller-supplied request parameter was out of range.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for LocatorError {
    fn from(err: serde_json::Error) -> Self {
        LocatorError::Storage(err.to_string())
    }
}

/// One page of extracted text, as supplied by the external PDF extractor.
///
/// Immutable once extracted. `page_number` is 1-based and unique within a
/// document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Page {
    pub document_id: String,
    pub page_number: u32,
    pub raw_text: String,
}

impl Page {
    pub fn new(
        document_id: impl Into<String>,
        page_number: u32,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            page_number,
            raw_text: raw_text.into(),
        }
    }
}

/// Structural granularity of a detected heading, coarsest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HeadingLevel {
    Unit,
    Chapter,
    Section,
}

impl fmt::Display for HeadingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "unit"),
            Self::Chapter => write!(f, "chapter"),
            Self::Section => write!(f, "section"),
        }
    }
}

/// A heading detected on a page, e.g. label `"4.2"`, title `"Quantum Mechanics"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructuralHeading {
    pub level: HeadingLevel,
    pub label: String,
    pub title: String,
    pub page_number: u32,
}

/// Label + title pair referenced from a [`StructuralContext`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeadingRef {
    pub label: String,
    pub title: String,
}

impl From<&StructuralHeading> for HeadingRef {
    fn from(heading: &StructuralHeading) -> Self {
        Self {
            label: heading.label.clone(),
            title: heading.title.clone(),
        }
    }
}

/// The unit/chapter/section labeling inherited by a page: the most recent
/// heading at each level on or before that page.
///
/// All-`None` is valid and expected for front matter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralContext {
    pub unit: Option<HeadingRef>,
    pub chapter: Option<HeadingRef>,
    pub section: Option<HeadingRef>,
}

impl StructuralContext {
    pub fn is_empty(&self) -> bool {
        self.unit.is_none() && self.chapter.is_none() && self.section.is_none()
    }

    /// Human-readable rendering of the finest available level, used in
    /// citations ("Section 4.2") and polishing prompts.
    pub fn describe(&self) -> Option<String> {
        if let Some(section) = &self.section {
            Some(format!("Section {}", section.label))
        } else if let Some(chapter) = &self.chapter {
            Some(format!("Chapter {}", chapter.label))
        } else {
            self.unit.as_ref().map(|unit| format!("Unit {}", unit.label))
        }
    }
}

/// A bounded, page-anchored span of document text: the unit of semantic
/// indexing.
///
/// `start_page <= end_page`; they differ only when the underlying paragraph
/// spans a page break.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    pub start_page: u32,
    pub end_page: u32,
    pub structural_context: StructuralContext,
}

/// Deterministic chunk id, stable for the document + index lifetime.
///
/// Sequential ids keep query tie-breaking reproducible and make duplicate
/// insertion a meaningful invariant violation rather than a coincidence.
pub fn chunk_id(document_id: &str, sequence: usize) -> String {
    format!("{document_id}#c{sequence:05}")
}

/// Ephemeral, query-scoped nearest-neighbor match. Never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchHit {
    pub chunk_id: String,
    pub similarity: f32,
}

/// A merged, human-readable page range with a confidence score: one citation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub document_id: String,
    pub page_start: u32,
    pub page_end: u32,
    pub structural_context: StructuralContext,
    pub confidence: f32,
    pub supporting_chunk_ids: Vec<String>,
}

impl ResolvedLocation {
    /// Citation string such as `"doc, pages 112-115, Section 4.2"`.
    pub fn describe(&self) -> String {
        let pages = if self.page_start == self.page_end {
            format!("page {}", self.page_start)
        } else {
            format!("pages {}-{}", self.page_start, self.page_end)
        };
        match self.structural_context.describe() {
            Some(context) => format!("{}, {pages}, {context}", self.document_id),
            None => format!("{}, {pages}", self.document_id),
        }
    }
}
