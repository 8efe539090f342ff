//! Text-to-speech narration.

use super::{AdapterError, OpenAiClient, types::SpeechGenerationRequest};
use bytes::Bytes;
use scribe_core::text::strip_html;
use serde::{Deserialize, Serialize};

/// Playback speed sent with every request.
const NORMAL_SPEED: f32 = 1.0;

/// Narration voice. `Alloy` has a neutral tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    #[default]
    Alloy,
    Echo,
    Fable,
    Onyx,
    Nova,
    Shimmer,
}

impl Voice {
    /// Wire name of the voice.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Voice::Alloy => "alloy",
            Voice::Echo => "echo",
            Voice::Fable => "fable",
            Voice::Onyx => "onyx",
            Voice::Nova => "nova",
            Voice::Shimmer => "shimmer",
        }
    }
}

/// Input for narration: the (HTML) content and a voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub content: String,
    #[serde(default)]
    pub voice: Voice,
}

impl OpenAiClient {
    /// Narrate content as MP3 audio. HTML is stripped before synthesis.
    pub async fn generate_speech(&self, request: &SpeechRequest) -> Result<Bytes, AdapterError> {
        let input = strip_html(&request.content);
        let body = SpeechGenerationRequest {
            model: &self.speech_model,
            input: &input,
            voice: request.voice.as_str(),
            response_format: "mp3",
            speed: NORMAL_SPEED,
        };

        tracing::info!(
            capability = "speech",
            model = %self.speech_model,
            voice = request.voice.as_str(),
            input_chars = input.chars().count(),
            "Generating speech"
        );
        let resp = self.send(self.post("/audio/speech").json(&body)).await?;
        resp.bytes()
            .await
            .map_err(|e| AdapterError::Stream(e.to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================
