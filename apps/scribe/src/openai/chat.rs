//! Blog content generation, one-shot and streamed.

use super::{
    AdapterError, OpenAiClient,
    types::{ChatChunk, ChatMessage, ChatRequest, ChatResponse},
};
use eventsource_stream::{Event, Eventsource};
use futures::{
    Stream, StreamExt,
    stream::{self, BoxStream},
};
use scribe_core::text::blog_prompt;

/// Server-sent event payload that terminates a completion stream.
const DONE_MARKER: &str = "[DONE]";

/// Text fragments of a streamed completion, in arrival order.
///
/// Finite and single-use: it ends cleanly only at the service's `[DONE]`
/// marker. A transport failure, or a close before `[DONE]`, is yielded as a
/// final `Err`. It cannot be restarted.
pub type ContentStream = BoxStream<'static, Result<String, AdapterError>>;

impl OpenAiClient {
    /// Generate a complete blog post body (HTML) for a title.
    pub async fn generate_content(&self, title: &str) -> Result<String, AdapterError> {
        let prompt = blog_prompt(title);
        let body = ChatRequest {
            model: &self.chat_model,
            messages: vec![ChatMessage::user(&prompt)],
            stream: false,
        };

        tracing::info!(capability = "content", model = %self.chat_model, "Generating blog content");
        let resp = self.send(self.post("/chat/completions").json(&body)).await?;
        let completion: ChatResponse = resp
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AdapterError::Parse("completion has no content".to_string()))
    }

    /// Stream a blog post body for a title, fragment by fragment.
    ///
    /// The request is sent (and its status checked) before this returns; the
    /// body is then passed through as it arrives with no buffering.
    pub async fn stream_content(&self, title: &str) -> Result<ContentStream, AdapterError> {
        let prompt = blog_prompt(title);
        let body = ChatRequest {
            model: &self.chat_model,
            messages: vec![ChatMessage::user(&prompt)],
            stream: true,
        };

        tracing::info!(capability = "stream", model = %self.chat_model, "Streaming blog content");
        let resp = self.send(self.post("/chat/completions").json(&body)).await?;

        Ok(completion_fragments(resp.bytes_stream().eventsource()))
    }
}

/// Turn parsed stream events into text fragments.
///
/// Stops after the first error. Running out of events without `[DONE]` is
/// reported as an error, since the completion was cut short.
fn completion_fragments<S, E>(events: S) -> ContentStream
where
    S: Stream<Item = Result<Event, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    stream::unfold(Some(events.boxed()), |state| async move {
        let mut events = state?;
        loop {
            match events.next().await {
                Some(Ok(event)) if event.data.trim() == DONE_MARKER => return None,
                Some(Ok(event)) => {
                    if let Some(text) = chunk_text(&event.data) {
                        return Some((Ok(text), Some(events)));
                    }
                }
                Some(Err(e)) => return Some((Err(AdapterError::Stream(e.to_string())), None)),
                None => {
                    let err = AdapterError::Stream("connection closed before completion".into());
                    return Some((Err(err), None));
                }
            }
        }
    })
    .boxed()
}

/// Pull the text delta out of one stream event, skipping empty deltas and
/// role-only or malformed chunks.
fn chunk_text(data: &str) -> Option<String> {
    match serde_json::from_str::<ChatChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|text| !text.is_empty()),
        Err(e) => {
            tracing::warn!(error = %e, payload_bytes = data.len(), "Skipping malformed stream chunk");
            None
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
