//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Generation handlers check the session's feature flags before calling an
//! adapter, and never hold the session lock across a remote call.

use super::{
    AppState,
    types::{
        AUDIO_CONTENT_TYPE, GenerateContentRequest, GenerateContentResponse,
        GenerateImageRequest, GenerateImageResponse, GenerateSpeechRequest, HealthResponse,
        SessionResponse, SpeechQuery, SpeechResponse, StagesResponse, StreamFragment, StreamQuery,
        UpdatePostRequest,
    },
};
use crate::openai::{AdapterError, ImageRequest, SpeechRequest};
use crate::session::{DemoSession, SessionError};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::{StreamExt, stream};
use scribe_core::{Feature, ScribeError, validate_content, validate_title};
use std::convert::Infallible;
use uuid::Uuid;

// =============================================================================
// ERROR MAPPING
// =============================================================================

fn session_status(err: SessionError) -> StatusCode {
    match err {
        SessionError::NotFound => StatusCode::NOT_FOUND,
        SessionError::LimitReached(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn adapter_status(err: &AdapterError) -> StatusCode {
    match err {
        AdapterError::RateLimited => StatusCode::SERVICE_UNAVAILABLE,
        AdapterError::MissingApiKey | AdapterError::Setup(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// 403 unless `feature` is enabled for the session's current stage.
fn check_feature(
    id: Uuid,
    session: &DemoSession,
    feature: Feature,
) -> Result<(), (StatusCode, String)> {
    if session.sequencer.flags().is_enabled(feature) {
        return Ok(());
    }
    tracing::warn!(
        event = "feature_locked",
        session_id = %id,
        feature = feature.name(),
        stage = %session.sequencer.stage(),
        "Feature not enabled at current stage"
    );
    Err((
        StatusCode::FORBIDDEN,
        format!(
            "Feature {} is not enabled at stage '{}'",
            feature.name(),
            session.sequencer.current_label()
        ),
    ))
}

/// Copy out a session if `feature` is enabled for it.
async fn require_feature(
    state: &AppState,
    id: Uuid,
    feature: Feature,
) -> Result<DemoSession, (StatusCode, String)> {
    let session = state
        .sessions
        .get(id)
        .await
        .map_err(|e| (session_status(e), e.to_string()))?;
    check_feature(id, &session, feature)?;
    Ok(session)
}

/// Apply `f` to the session only if `feature` is still enabled. The stage may
/// have moved back while the remote call was in flight.
async fn store_if_enabled<F>(
    state: &AppState,
    id: Uuid,
    feature: Feature,
    f: F,
) -> Result<(), (StatusCode, String)>
where
    F: FnOnce(&mut DemoSession) -> Result<(), ScribeError>,
{
    state
        .sessions
        .with_session_mut(id, |session| {
            check_feature(id, session, feature)?;
            f(session).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
        })
        .await
        .map_err(|e| (session_status(e), e.to_string()))?
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STAGES HANDLER
// =============================================================================

/// List all demo stages.
pub async fn stages_handler() -> impl IntoResponse {
    Json(StagesResponse::all())
}

// =============================================================================
// SESSION HANDLERS
// =============================================================================

/// Open a new demo session.
pub async fn create_session_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.sessions.create().await {
        Ok((id, session)) => (
            StatusCode::CREATED,
            Json(SessionResponse::success(id, &session)),
        ),
        Err(e) => (session_status(e), Json(SessionResponse::error(e.to_string()))),
    }
}

/// Get a session's state.
pub async fn get_session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.sessions.get(id).await {
        Ok(session) => (StatusCode::OK, Json(SessionResponse::success(id, &session))),
        Err(e) => (session_status(e), Json(SessionResponse::error(e.to_string()))),
    }
}

/// End a session.
pub async fn delete_session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.sessions.remove(id).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(e) => session_status(e),
    }
}

/// Move to the next stage. A no-op at the last stage.
pub async fn next_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    navigate(&state, id, "next", |s| s.sequencer.advance()).await
}

/// Move to the previous stage. A no-op at the first stage.
pub async fn previous_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    navigate(&state, id, "previous", |s| s.sequencer.retreat()).await
}

/// Return to the first stage.
pub async fn reset_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    navigate(&state, id, "reset", |s| {
        s.sequencer.reset();
        true
    })
    .await
}

async fn navigate(
    state: &AppState,
    id: Uuid,
    direction: &'static str,
    step: impl FnOnce(&mut DemoSession) -> bool,
) -> (StatusCode, Json<SessionResponse>) {
    let result = state
        .sessions
        .with_session_mut(id, |session| {
            let moved = step(session);
            (moved, session.clone())
        })
        .await;

    match result {
        Ok((moved, session)) => {
            tracing::info!(
                session_id = %id,
                direction,
                moved,
                stage = %session.sequencer.stage(),
                "Demo navigation"
            );
            (StatusCode::OK, Json(SessionResponse::success(id, &session)))
        }
        Err(e) => (session_status(e), Json(SessionResponse::error(e.to_string()))),
    }
}

/// Edit the draft's title and/or content.
pub async fn update_post_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePostRequest>,
) -> impl IntoResponse {
    let result = state
        .sessions
        .with_session_mut(id, |session| -> Result<DemoSession, ScribeError> {
            if let Some(title) = request.title {
                session.post.set_title(title)?;
            }
            if let Some(content) = request.content {
                session.post.set_content(content);
            }
            Ok(session.clone())
        })
        .await;

    match result {
        Ok(Ok(session)) => (StatusCode::OK, Json(SessionResponse::success(id, &session))),
        Ok(Err(e)) => (
            StatusCode::BAD_REQUEST,
            Json(SessionResponse::error(e.to_string())),
        ),
        Err(e) => (session_status(e), Json(SessionResponse::error(e.to_string()))),
    }
}

// =============================================================================
// CONTENT GENERATION HANDLERS
// =============================================================================

/// Generate a full post body and store it in the draft.
pub async fn generate_content_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    request: Option<Json<GenerateContentRequest>>,
) -> impl IntoResponse {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let session = match require_feature(&state, id, Feature::StandardGeneration).await {
        Ok(s) => s,
        Err((status, msg)) => return (status, Json(GenerateContentResponse::error(msg))),
    };

    let title = request.title.unwrap_or(session.post.title);
    if let Err(e) = validate_title(&title) {
        return (
            StatusCode::BAD_REQUEST,
            Json(GenerateContentResponse::error(e.to_string())),
        );
    }

    let content = match state.client.generate_content(&title).await {
        Ok(content) => content,
        Err(e) => {
            return (
                adapter_status(&e),
                Json(GenerateContentResponse::error(format!(
                    "Error generating content: {}",
                    e
                ))),
            );
        }
    };

    let stored = store_if_enabled(&state, id, Feature::StandardGeneration, |session| {
        session.post.set_title(title)?;
        session.post.set_content(content.clone());
        Ok(())
    })
    .await;

    match stored {
        Ok(()) => (StatusCode::OK, Json(GenerateContentResponse::success(content))),
        Err((status, msg)) => (status, Json(GenerateContentResponse::error(msg))),
    }
}

/// Stream a post body as server-sent events.
///
/// Emits one `token` event per fragment (`{"text": "..."}`) in arrival order.
/// The stream then ends with `done` once the service sends `[DONE]`, or with
/// a single `error` event if the upstream stream breaks or closes early.
/// Streamed text is not stored in the draft; clients save it with `PUT /post`.
pub async fn stream_content_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<StreamQuery>,
) -> Response {
    let session = match require_feature(&state, id, Feature::StreamingGeneration).await {
        Ok(s) => s,
        Err((status, msg)) => {
            return (status, Json(GenerateContentResponse::error(msg))).into_response();
        }
    };

    let title = query.title.unwrap_or(session.post.title);
    if let Err(e) = validate_title(&title) {
        return (
            StatusCode::BAD_REQUEST,
            Json(GenerateContentResponse::error(e.to_string())),
        )
            .into_response();
    }

    let fragments = match state.client.stream_content(&title).await {
        Ok(fragments) => fragments,
        Err(e) => {
            return (
                adapter_status(&e),
                Json(GenerateContentResponse::error(format!(
                    "Error generating content: {}",
                    e
                ))),
            )
                .into_response();
        }
    };

    let events = stream::unfold(Some(fragments), |state| async move {
        let mut fragments = state?;
        let event = match fragments.next().await {
            Some(Ok(text)) => match Event::default()
                .event("token")
                .json_data(StreamFragment { text })
            {
                Ok(event) => return Some((event, Some(fragments))),
                Err(e) => Event::default().event("error").data(e.to_string()),
            },
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Content stream interrupted");
                Event::default().event("error").data(e.to_string())
            }
            None => Event::default().event("done").data("[DONE]"),
        };
        Some((event, None))
    })
    .map(Ok::<_, Infallible>);

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

// =============================================================================
// IMAGE GENERATION HANDLER
// =============================================================================

/// Generate a header image and attach its URL to the draft.
pub async fn generate_image_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    request: Option<Json<GenerateImageRequest>>,
) -> impl IntoResponse {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let session = match require_feature(&state, id, Feature::ImageGeneration).await {
        Ok(s) => s,
        Err((status, msg)) => return (status, Json(GenerateImageResponse::error(msg))),
    };

    let image_request = ImageRequest {
        title: request.title.unwrap_or(session.post.title),
        content: request.content.unwrap_or(session.post.content),
    };
    if let Err(e) = validate_title(&image_request.title)
        .and_then(|()| validate_content(&image_request.content))
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(GenerateImageResponse::error(e.to_string())),
        );
    }

    let url = match state.client.generate_image(&image_request).await {
        Ok(url) => url,
        Err(e) => {
            return (
                adapter_status(&e),
                Json(GenerateImageResponse::error(format!(
                    "Error generating image: {}",
                    e
                ))),
            );
        }
    };

    let stored = store_if_enabled(&state, id, Feature::ImageGeneration, |session| {
        session.post.set_header_image(url.clone());
        Ok(())
    })
    .await;

    match stored {
        Ok(()) => (StatusCode::OK, Json(GenerateImageResponse::success(url))),
        Err((status, msg)) => (status, Json(GenerateImageResponse::error(msg))),
    }
}

// =============================================================================
// SPEECH GENERATION HANDLER
// =============================================================================

/// Narrate the draft (or the given content) as MP3.
pub async fn generate_speech_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<SpeechQuery>,
    request: Option<Json<GenerateSpeechRequest>>,
) -> Response {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let session = match require_feature(&state, id, Feature::SpeechGeneration).await {
        Ok(s) => s,
        Err((status, msg)) => return (status, Json(SpeechResponse::error(msg))).into_response(),
    };

    let speech_request = SpeechRequest {
        content: request.content.unwrap_or(session.post.content),
        voice: request.voice,
    };
    if let Err(e) = validate_content(&speech_request.content) {
        return (
            StatusCode::BAD_REQUEST,
            Json(SpeechResponse::error(e.to_string())),
        )
            .into_response();
    }

    match state.client.generate_speech(&speech_request).await {
        Ok(audio) if query.wants_base64() => {
            (StatusCode::OK, Json(SpeechResponse::success(&audio))).into_response()
        }
        Ok(audio) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, AUDIO_CONTENT_TYPE)],
            audio,
        )
            .into_response(),
        Err(e) => (
            adapter_status(&e),
            Json(SpeechResponse::error(format!(
                "Error generating speech: {}",
                e
            ))),
        )
            .into_response(),
    }
}
