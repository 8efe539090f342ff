//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use crate::openai::Voice;
use crate::session::DemoSession;
use scribe_core::{BlogPost, Feature, SequencerSnapshot, Stage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STAGES RESPONSE
// =============================================================================

/// One row of the stage table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageInfo {
    pub index: usize,
    pub stage: Stage,
    pub label: String,
    /// Feature switched on when this stage is reached.
    pub unlocks: Option<Feature>,
}

/// Static list of demo stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagesResponse {
    pub stages: Vec<StageInfo>,
}

impl StagesResponse {
    pub fn all() -> Self {
        let stages = Stage::ALL
            .iter()
            .map(|stage| StageInfo {
                index: stage.index(),
                stage: *stage,
                label: stage.label().to_string(),
                unlocks: Feature::ALL
                    .iter()
                    .copied()
                    .find(|f| f.required_stage() == *stage),
            })
            .collect();
        Self { stages }
    }
}

// =============================================================================
// SESSION RESPONSE
// =============================================================================

/// A session's navigation state and draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub success: bool,
    pub session_id: Option<Uuid>,
    pub state: Option<SequencerSnapshot>,
    pub post: Option<BlogPost>,
    pub error: Option<String>,
}

impl SessionResponse {
    pub fn success(id: Uuid, session: &DemoSession) -> Self {
        Self {
            success: true,
            session_id: Some(id),
            state: Some(session.sequencer.snapshot()),
            post: Some(session.post.clone()),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            session_id: None,
            state: None,
            post: None,
            error: Some(msg.into()),
        }
    }
}

/// Draft edit. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

// =============================================================================
// CONTENT GENERATION
// =============================================================================

/// Content generation request. Uses the draft title when `title` is absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateContentRequest {
    pub title: Option<String>,
}

/// Streaming request, passed as query parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamQuery {
    pub title: Option<String>,
}

/// One `token` event of a content stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamFragment {
    pub text: String,
}

/// Generated content response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateContentResponse {
    pub success: bool,
    pub content: Option<String>,
    pub error: Option<String>,
}

impl GenerateContentResponse {
    pub fn success(content: String) -> Self {
        Self {
            success: true,
            content: Some(content),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            content: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// IMAGE GENERATION
// =============================================================================

/// Image generation request. Absent fields fall back to the draft.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateImageRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Generated image response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateImageResponse {
    pub success: bool,
    pub url: Option<String>,
    pub error: Option<String>,
}

impl GenerateImageResponse {
    pub fn success(url: String) -> Self {
        Self {
            success: true,
            url: Some(url),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            url: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// SPEECH GENERATION
// =============================================================================

/// Speech generation request. Uses the draft content when `content` is absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateSpeechRequest {
    pub content: Option<String>,
    #[serde(default)]
    pub voice: Voice,
}

/// Output selector for speech: raw `audio/mpeg` by default, `base64` for JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechQuery {
    pub format: Option<String>,
}

impl SpeechQuery {
    pub fn wants_base64(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("base64"))
    }
}

/// Speech response in JSON form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechResponse {
    pub success: bool,
    pub content_type: Option<String>,
    pub audio: Option<String>, // Base64 encoded
    pub error: Option<String>,
}

impl SpeechResponse {
    pub fn success(audio: &[u8]) -> Self {
        Self {
            success: true,
            content_type: Some(AUDIO_CONTENT_TYPE.to_string()),
            audio: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                audio,
            )),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            content_type: None,
            audio: None,
            error: Some(msg.into()),
        }
    }
}

/// MIME type of generated speech.
pub const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

// =============================================================================
// TESTS
// =============================================================================
