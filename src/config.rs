//! Tunable configuration for the locator pipeline.
//!
//! Every knob has a sensible default; `EngineConfig::from_env` layers
//! environment overrides on top (a `.env` file is honored via `dotenvy`).

use std::env;

/// Window bounds for the chunking engine, in characters of normalized text.
#[derive(Clone, Debug)]
pub struct ChunkingConfig {
    /// Preferred lower bound before a window is flushed.
    pub min_chars: usize,
    /// Hard upper bound; oversized paragraphs are split at sentence
    /// boundaries, or mid-sentence as a last resort.
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_chars: 200,
            max_chars: 1200,
        }
    }
}

/// Controls how matched chunks collapse into citations.
#[derive(Clone, Debug)]
pub struct ResolverConfig {
    /// Hits below this cosine similarity are discarded before merging.
    pub min_similarity: f32,
    /// Maximum number of unretrieved pages bridged between two hits before
    /// they become separate citations. `1` merges hits on pages 112 and 114.
    pub page_gap_tolerance: u32,
    /// Cap on emitted locations, avoiding a low-value tail.
    pub max_locations: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.25,
            page_gap_tolerance: 1,
            max_locations: 5,
        }
    }
}

/// Connection settings for the HTTP embedding provider.
#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:11434".to_string(),
            model: "nomic-embed-text".to_string(),
        }
    }
}

/// Connection settings for the optional tone polisher.
#[derive(Clone, Debug)]
pub struct PolishConfig {
    pub endpoint: String,
    pub model: String,
}

impl Default for PolishConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:11434".to_string(),
            model: "llama3.2".to_string(),
        }
    }
}

/// Top-level configuration handed to the service and ingestion pipeline.
#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    pub chunking: ChunkingConfig,
    pub resolver: ResolverConfig,
    pub embedding: EmbeddingConfig,
    pub polish: PolishConfig,
    /// Candidate pool size requested from the vector store per query.
    pub query_top_k: usize,
}

impl EngineConfig {
    /// Builds a config from defaults plus `PAGEMARK_*` environment overrides.
    ///
    /// Unparseable numeric values are logged and ignored rather than failing
    /// startup.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self {
            query_top_k: 16,
            ..Self::default()
        };

        if let Some(value) = env_parse::<usize>("PAGEMARK_CHUNK_MIN_CHARS") {
            config.chunking.min_chars = value;
        }
        if let Some(value) = env_parse::<usize>("PAGEMARK_CHUNK_MAX_CHARS") {
            config.chunking.max_chars = value;
        }
        if let Some(value) = env_parse::<f32>("PAGEMARK_MIN_SIMILARITY") {
            config.resolver.min_similarity = value;
        }
        if let Some(value) = env_parse::<u32>("PAGEMARK_PAGE_GAP_TOLERANCE") {
            config.resolver.page_gap_tolerance = value;
        }
        if let Some(value) = env_parse::<usize>("PAGEMARK_MAX_LOCATIONS") {
            config.resolver.max_locations = value;
        }
        if let Some(value) = env_parse::<usize>("PAGEMARK_QUERY_TOP_K") {
            config.query_top_k = value;
        }
        if let Ok(endpoint) = env::var("PAGEMARK_EMBEDDING_ENDPOINT") {
            config.embedding.endpoint = endpoint;
        }
        if let Ok(model) = env::var("PAGEMARK_EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(endpoint) = env::var("PAGEMARK_POLISH_ENDPOINT") {
            config.polish.endpoint = endpoint;
        }
        if let Ok(model) = env::var("PAGEMARK_POLISH_MODEL") {
            config.polish.model = model;
        }

        config
    }

    /// Defaults with a populated candidate pool size, without touching the
    /// environment.
    pub fn standard() -> Self {
        Self {
            query_top_k: 16,
            ..Self::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(%key, %raw, "ignoring unparseable config override");
            None
        }
    }
}
