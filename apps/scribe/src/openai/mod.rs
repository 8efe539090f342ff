//! # AI Capability Adapters
//!
//! Thin wrappers around an OpenAI-compatible HTTP API, one typed call per
//! capability:
//!
//! | Capability | Endpoint | Result |
//! |------------|----------|--------|
//! | [`OpenAiClient::generate_content`] | `POST /chat/completions` | HTML markup |
//! | [`OpenAiClient::stream_content`] | `POST /chat/completions` (SSE) | stream of text fragments |
//! | [`OpenAiClient::generate_image`] | `POST /images/generations` | image URL |
//! | [`OpenAiClient::generate_speech`] | `POST /audio/speech` | MP3 bytes |
//!
//! The adapters know nothing about stages or feature flags; gating happens in
//! the API handlers before a call is made.

mod chat;
mod image;
mod speech;
mod types;

pub use chat::ContentStream;
pub use image::ImageRequest;
pub use speech::{SpeechRequest, Voice};

use crate::config::OpenAiConfig;
use std::time::Duration;
use thiserror::Error;

const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Error bodies longer than this are truncated before being surfaced.
const MAX_ERROR_BODY_BYTES: usize = 4 * 1024;

// =============================================================================
// ERRORS
// =============================================================================

/// Errors from the adapter layer.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// No API key configured.
    #[error("OpenAI API key not found")]
    MissingApiKey,

    /// The HTTP client could not be built.
    #[error("HTTP client setup failed: {0}")]
    Setup(String),

    /// Cannot reach the AI service.
    #[error("Cannot connect to AI service at {0}")]
    Connection(String),

    /// 401 Unauthorized - invalid API key.
    #[error("Unauthorized: the AI service rejected the API key")]
    Unauthorized,

    /// 429 Too Many Requests.
    #[error("Rate limited by the AI service")]
    RateLimited,

    /// Any other non-success status.
    #[error("AI service error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The event stream broke mid-response.
    #[error("Stream error: {0}")]
    Stream(String),
}

// =============================================================================
// CLIENT
// =============================================================================

/// HTTP client shared by every capability adapter.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    chat_model: String,
    image_model: String,
    speech_model: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("image_model", &self.image_model)
            .field("speech_model", &self.speech_model)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    /// Build a client from configuration. Fails if no API key is set.
    pub fn new(config: &OpenAiConfig) -> Result<Self, AdapterError> {
        let api_key = config
            .api_key()
            .map_err(|_| AdapterError::MissingApiKey)?
            .to_string();

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .read_timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| AdapterError::Setup(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            chat_model: config.chat_model.clone(),
            image_model: config.image_model.clone(),
            speech_model: config.speech_model.clone(),
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build an authenticated POST request.
    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.http.post(url).bearer_auth(&self.api_key)
    }

    /// Send a request, mapping transport failures and error statuses.
    async fn send(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AdapterError> {
        let resp = req.send().await.map_err(|e| {
            tracing::warn!(error = %e, "AI service request failed");
            AdapterError::Connection(format!("{}: {e}", self.base_url))
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::error!(event = "upstream_auth_failure", "AI service rejected the API key");
            return Err(AdapterError::Unauthorized);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!("AI service rate limit hit");
            return Err(AdapterError::RateLimited);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = error_message(&body);
        tracing::warn!(status = status.as_u16(), %message, "AI service returned an error");
        Err(AdapterError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Extract a readable message from an error body.
///
/// Prefers the `error.message` field of an OpenAI error envelope and falls
/// back to the raw body, capped at [`MAX_ERROR_BODY_BYTES`].
fn error_message(body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<types::ErrorEnvelope>(body) {
        return envelope.error.message;
    }
    if body.len() <= MAX_ERROR_BODY_BYTES {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &body[..end])
}

// =============================================================================
// TESTS
// =============================================================================
