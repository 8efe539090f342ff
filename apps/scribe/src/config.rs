//! # Configuration
//!
//! Scribe reads a TOML file once at startup (default `scribe.toml`) and then
//! applies environment overrides.
//!
//! ```toml
//! [features]
//! enable_standard_content_generation = false
//! enable_streaming_content_generation = false
//! enable_image_generation = false
//! enable_speech_generation = false
//! seed_policy = "align"
//!
//! [openai]
//! base_url = "https://api.openai.com/v1"
//! chat_model = "gpt-4o"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! ```
//!
//! ## Environment Variables
//!
//! - `SCRIBE_OPENAI_API_KEY`: API key for the AI service (falls back to `OPENAI_API_KEY`)
//! - `SCRIBE_OPENAI_BASE_URL`: Override the AI service base URL
//!
//! A missing config file is not an error; every field has a default. A
//! missing API key only becomes fatal when the server starts.

use scribe_core::{FeatureConfig, ScribeError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default OpenAI API base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default cap on concurrently open demo sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// Default idle time after which a session is evicted (one hour).
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 3600;

// =============================================================================
// CONFIG STRUCTURE
// =============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub features: FeatureConfig,
    pub openai: OpenAiConfig,
    pub server: ServerConfig,
}

/// Settings for the remote AI service.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub image_model: String,
    pub speech_model: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            chat_model: "gpt-4o".to_string(),
            image_model: "dall-e-3".to_string(),
            speech_model: "tts-1".to_string(),
            timeout_secs: 120,
        }
    }
}

// Keeps the key out of logs and `scribe config` output.
impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("image_model", &self.image_model)
            .field("speech_model", &self.speech_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl OpenAiConfig {
    /// Get the API key, failing with setup instructions when absent.
    pub fn api_key(&self) -> Result<&str, ScribeError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ScribeError::Config(
                    "OpenAI API key not found. Set SCRIBE_OPENAI_API_KEY or openai.api_key in the config file"
                        .to_string(),
                )
            })
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_sessions: usize,
    /// Seconds a session may sit untouched before eviction. 0 disables.
    pub session_idle_secs: u64,
}

impl ServerConfig {
    /// Idle timeout for sessions, `None` when expiry is disabled.
    pub fn session_idle_timeout(&self) -> Option<std::time::Duration> {
        (self.session_idle_secs > 0)
            .then(|| std::time::Duration::from_secs(self.session_idle_secs))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_sessions: DEFAULT_MAX_SESSIONS,
            session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
        }
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ScribeError> {
        toml::from_str(text).map_err(|e| ScribeError::Config(format!("Invalid config: {}", e)))
    }

    /// Load the file at `path` (defaults if it does not exist), then apply
    /// environment overrides.
    pub fn load(path: &Path) -> Result<Self, ScribeError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|e| {
                ScribeError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
            })?;
            Self::from_toml(&text)?
        } else {
            tracing::info!("Config file {} not found, using defaults", path.display());
            Self::default()
        };

        config.apply_env();
        Ok(config)
    }

    /// Apply `SCRIBE_*` environment overrides.
    pub fn apply_env(&mut self) {
        let key = std::env::var("SCRIBE_OPENAI_API_KEY")
            .ok()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.is_empty());
        if key.is_some() {
            self.openai.api_key = key;
        }

        if let Some(url) = std::env::var("SCRIBE_OPENAI_BASE_URL")
            .ok()
            .filter(|u| !u.is_empty())
        {
            self.openai.base_url = url;
        }
    }

    /// Render the effective configuration as TOML with the API key redacted.
    pub fn to_redacted_toml(&self) -> Result<String, ScribeError> {
        let mut redacted = self.clone();
        if redacted.openai.api_key.is_some() {
            redacted.openai.api_key = Some("<redacted>".to_string());
        }
        toml::to_string_pretty(&redacted)
            .map_err(|e| ScribeError::Config(format!("Cannot render config: {}", e)))
    }
}

// =============================================================================
// TESTS
// =============================================================================
