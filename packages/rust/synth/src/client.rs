//! Text-completion collaborator boundary.
//!
//! [`CompletionClient`] is the seam the synthesizer is written against;
//! [`GeminiClient`] is the production implementation over a
//! `generateContent`-style REST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use repodocs_shared::{CompletionConfig, RepodocsError, Result, UpstreamKind};

// ---------------------------------------------------------------------------
// Generation parameters
// ---------------------------------------------------------------------------

/// Generation parameters sent with every completion request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_k: 32,
            top_p: 0.9,
            max_output_tokens: 8192,
        }
    }
}

// ---------------------------------------------------------------------------
// CompletionClient trait
// ---------------------------------------------------------------------------

/// Opaque text-completion collaborator.
///
/// `Ok(None)` means the service answered without producing text; the
/// caller treats that as a hard failure. The service may also return text
/// truncated mid-structure by its own output-length cap.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        params: &GenerationParams,
    ) -> Result<Option<String>>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: &'a GenerationParams,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// First candidate's first text part, if the service produced any.
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
    }
}

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

/// REST client for a Gemini-style `models/{model}:generateContent`
/// endpoint.
pub struct GeminiClient {
    http: Client,
    api_base: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RepodocsError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Build from config, reading the API key from the configured env var.
    pub fn from_config(config: &CompletionConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            RepodocsError::config(format!(
                "completion API key not found. Set the {} environment variable.",
                config.api_key_env
            ))
        })?;
        Self::new(
            &config.api_base,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

fn map_status(status: StatusCode, message: &str) -> RepodocsError {
    let kind = match status {
        StatusCode::NOT_FOUND => UpstreamKind::NotFound,
        StatusCode::UNAUTHORIZED => UpstreamKind::Unauthorized,
        StatusCode::FORBIDDEN => UpstreamKind::Forbidden,
        StatusCode::TOO_MANY_REQUESTS => UpstreamKind::RateLimited,
        other => UpstreamKind::Other(other.as_u16()),
    };
    RepodocsError::upstream(kind, message)
}

#[async_trait]
impl CompletionClient for GeminiClient {
    #[instrument(skip_all, fields(model = %model, prompt_chars = prompt.len()))]
    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        params: &GenerationParams,
    ) -> Result<Option<String>> {
        let url = format!(
            "{}/models/{model}:generateContent?key={}",
            self.api_base, self.api_key
        );

        let request = GenerateRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: params,
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RepodocsError::Network(format!("completion request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, &format!("completion API: {body}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RepodocsError::Network(format!("invalid completion response: {e}")))?;

        let text = parsed.into_text();
        debug!(
            produced = text.is_some(),
            "completion call finished"
        );
        Ok(text)
    }
}
