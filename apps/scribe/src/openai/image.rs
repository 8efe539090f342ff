//! Header image generation.

use super::{
    AdapterError, OpenAiClient,
    types::{ImageGenerationRequest, ImageGenerationResponse},
};
use scribe_core::text::image_prompt;
use serde::{Deserialize, Serialize};

/// Input for a header image: the post's title and (HTML) content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRequest {
    pub title: String,
    pub content: String,
}

impl OpenAiClient {
    /// Generate a header image and return its URL.
    pub async fn generate_image(&self, request: &ImageRequest) -> Result<String, AdapterError> {
        let prompt = image_prompt(&request.title, &request.content);
        let body = ImageGenerationRequest {
            model: &self.image_model,
            prompt: &prompt,
            n: 1,
            size: "1024x1024",
            quality: "standard",
            style: "natural",
            response_format: "url",
        };

        tracing::info!(capability = "image", model = %self.image_model, "Generating header image");
        let resp = self
            .send(self.post("/images/generations").json(&body))
            .await?;
        let generated: ImageGenerationResponse = resp
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        generated
            .data
            .into_iter()
            .find_map(|image| image.url)
            .ok_or_else(|| AdapterError::Parse("image response has no URL".to_string()))
    }
}
