//! One-shot synthesis endpoints under `/api/v1/tts`.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use super::AppState;
use super::error::ApiError;
use super::protocol::{TtsRequest, TtsResponse};
use crate::backend::{Backend, decode_audio};
use crate::engine::{SpeechOutput, TTSError};

async fn run<B: Backend + 'static>(
    state: &AppState<B>,
    body: Result<Json<TtsRequest>, JsonRejection>,
) -> Result<(TtsRequest, SpeechOutput), ApiError> {
    let Json(request) = body?;
    request
        .validate(state.settings.max_text_length)
        .map_err(ApiError::unprocessable)?;

    let speech = request.to_speech(state.settings.default_tts_model);
    let output = state.engine.synthesize(&speech).await?;
    Ok((request, output))
}

/// `POST /tts/synthesize`: audio inlined as a data URL.
pub async fn synthesize<B: Backend + 'static>(
    State(state): State<AppState<B>>,
    body: Result<Json<TtsRequest>, JsonRejection>,
) -> Result<Json<TtsResponse>, ApiError> {
    let (_, output) = run(&state, body).await?;

    Ok(Json(TtsResponse {
        audio_url: format!("data:audio/wav;base64,{}", output.result.audio_base64),
        duration_seconds: output.result.duration_seconds,
        model_used: output.result.model,
        processing_time_ms: output.processing_time_ms,
    }))
}

/// `POST /tts/synthesize/audio`: raw audio bytes as an attachment.
pub async fn synthesize_audio<B: Backend + 'static>(
    State(state): State<AppState<B>>,
    body: Result<Json<TtsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let (request, output) = run(&state, body).await?;
    let bytes = decode_audio(&output.result.audio_base64).map_err(TTSError::from)?;

    let format = request.output_format;
    let headers = [
        (header::CONTENT_TYPE, format.content_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"speech.{}\"", format.extension()),
        ),
        (
            header::HeaderName::from_static("x-duration-seconds"),
            output.result.duration_seconds.to_string(),
        ),
        (
            header::HeaderName::from_static("x-processing-time-ms"),
            output.result.processing_time_ms.to_string(),
        ),
    ];
    Ok((headers, bytes).into_response())
}

/// `GET /tts/models`
pub async fn list_models<B: Backend + 'static>(State(state): State<AppState<B>>) -> Json<Value> {
    Json(json!({ "models": state.engine.models() }))
}
