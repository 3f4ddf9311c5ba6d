//! Page-anchored chunking and location-resolving semantic retrieval.
//!
//! Pagemark answers "where is this discussed?" over a corpus of textbooks:
//! instead of synthesizing an answer, it returns citations such as
//! "pages 112-115, Section 4.2".
//!
//! ```text
//! Extracted pages ──► structure::StructureDetector ──► Outline
//!                │
//!                └──► chunking::chunk_pages ──► page-anchored Chunks
//!
//! Chunks ──► embeddings::EmbeddingProvider ──► stores::InMemoryStore
//!                                                    │
//! Query text ──► embed ──► stores::VectorStore::query┘
//!                                │
//!                                ▼
//!                    resolve::resolve ──► ResolvedLocations
//!                                │
//!                                └──► polish::TonePolisher (optional,
//!                                     fail-soft)
//! ```
//!
//! [`service::LocatorService`] wires the pieces together per query;
//! [`ingestion`] drives the build-time path.

pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod ingestion;
pub mod polish;
pub mod resolve;
pub mod service;
pub mod stores;
pub mod structure;
pub mod types;

pub use config::EngineConfig;
pub use ingestion::{IngestReport, ingest_batch, ingest_document};
pub use service::{LocateRequest, LocateResponse, LocatorService};
pub use stores::{InMemoryStore, VectorStore};
pub use types::{
    Chunk, HeadingLevel, LocatorError, MatchHit, Page, ResolvedLocation, StructuralContext,
    StructuralHeading,
};
