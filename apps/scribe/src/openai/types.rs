//! Wire types for the OpenAI-compatible endpoints Scribe calls.
//!
//! Only the fields Scribe reads or writes are modelled; unknown response
//! fields are ignored.

use serde::{Deserialize, Serialize};

// =============================================================================
// CHAT COMPLETIONS
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

impl<'a> ChatMessage<'a> {
    pub fn user(content: &'a str) -> Self {
        Self {
            role: "user",
            content,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatReply,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatReply {
    pub content: Option<String>,
}

/// One `chat.completion.chunk` event of a streamed completion.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChunkDelta {
    pub content: Option<String>,
}

// =============================================================================
// IMAGES
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct ImageGenerationRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub n: u8,
    pub size: &'static str,
    pub quality: &'static str,
    pub style: &'static str,
    pub response_format: &'static str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageGenerationResponse {
    #[serde(default)]
    pub data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageData {
    pub url: Option<String>,
}

// =============================================================================
// SPEECH
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct SpeechGenerationRequest<'a> {
    pub model: &'a str,
    pub input: &'a str,
    pub voice: &'static str,
    pub response_format: &'static str,
    pub speed: f32,
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    pub message: String,
}
