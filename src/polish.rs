//! Optional tone-polishing collaborator.
//!
//! Polishing runs after the authoritative locations are already computed and
//! is strictly additive: the orchestrator swallows and logs every polishing
//! failure, so this module is never on the critical path for correctness.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::PolishConfig;
use crate::types::{LocatorError, ResolvedLocation};

/// Instruction prefixed to every polishing prompt. The model may rephrase
/// but must not add claims absent from the supplied excerpts.
const POLISH_INSTRUCTION: &str = "Rephrase the citation summary below in a friendly tone. \
    Rephrase only; do not introduce any fact that is not present in the excerpts.";

/// Pluggable post-processor that turns resolved citations into a readable
/// summary sentence.
#[async_trait]
pub trait TonePolisher: Send + Sync {
    async fn polish(
        &self,
        query: &str,
        locations: &[ResolvedLocation],
        excerpts: &[String],
    ) -> Result<String, LocatorError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Polisher backed by an Ollama-compatible `/api/generate` endpoint.
#[derive(Clone)]
pub struct HttpPolisher {
    client: reqwest::Client,
    config: PolishConfig,
}

impl HttpPolisher {
    pub fn new(config: PolishConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn build_prompt(query: &str, locations: &[ResolvedLocation], excerpts: &[String]) -> String {
        let mut prompt = String::new();
        prompt.push_str(POLISH_INSTRUCTION);
        prompt.push_str("\n\nQuestion: ");
        prompt.push_str(query);
        prompt.push_str("\n\nCitations:\n");
        for location in locations {
            prompt.push_str("- ");
            prompt.push_str(&location.describe());
            prompt.push('\n');
        }
        if !excerpts.is_empty() {
            prompt.push_str("\nExcerpts:\n");
            for excerpt in excerpts {
                prompt.push_str("- ");
                prompt.push_str(excerpt);
                prompt.push('\n');
            }
        }
        prompt
    }
}

#[async_trait]
impl TonePolisher for HttpPolisher {
    async fn polish(
        &self,
        query: &str,
        locations: &[ResolvedLocation],
        excerpts: &[String],
    ) -> Result<String, LocatorError> {
        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        let prompt = Self::build_prompt(query, locations, excerpts);
        let request = GenerateRequest {
            model: &self.config.model,
            prompt: &prompt,
            stream: false,
        };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| LocatorError::Polishing(err.to_string()))?
            .error_for_status()
            .map_err(|err| LocatorError::Polishing(err.to_string()))?;
        let payload: GenerateResponse = response
            .json()
            .await
            .map_err(|err| LocatorError::Polishing(err.to_string()))?;
        let summary = payload.response.trim().to_string();
        if summary.is_empty() {
            return Err(LocatorError::Polishing(
                "polisher returned an empty response".to_string(),
            ));
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StructuralContext;
    use httpmock::prelude::*;

    fn location() -> ResolvedLocation {
        ResolvedLocation {
            document_id: "physics".into(),
            page_start: 112,
            page_end: 115,
            structural_context: StructuralContext::default(),
            confidence: 0.9,
            supporting_chunk_ids: vec!["physics#c00004".into()],
        }
    }

    #[test]
    fn prompt_carries_constraint_citations_and_excerpts() {
        let prompt = HttpPolisher::build_prompt(
            "where is quantum mechanics discussed?",
            &[location()],
            &["The wave function describes probability amplitudes.".to_string()],
        );
        assert!(prompt.contains("do not introduce any fact"));
        assert!(prompt.contains("physics, pages 112-115"));
        assert!(prompt.contains("wave function"));
    }

    #[tokio::test]
    async fn polisher_returns_model_response() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200)
                .json_body(serde_json::json!({ "response": "See pages 112-115." }));
        });

        let polisher = HttpPolisher::new(PolishConfig {
            endpoint: server.base_url(),
            model: "test-model".to_string(),
        });
        let summary = polisher
            .polish("quantum mechanics", &[location()], &[])
            .await
            .unwrap();
        assert_eq!(summary, "See pages 112-115.");
        mock.assert();
    }

    #[tokio::test]
    async fn polisher_failure_surfaces_as_polishing_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(500);
        });

        let polisher = HttpPolisher::new(PolishConfig {
            endpoint: server.base_url(),
            model: "test-model".to_string(),
        });
        let err = polisher
            .polish("quantum mechanics", &[location()], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, LocatorError::Polishing(_)));
    }
}
