//! Voice profile endpoints under `/api/v1/voices`.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::AppState;
use super::error::ApiError;
use crate::audio::AudioError;
use crate::backend::Backend;
use crate::voice::{
    NewVoice, ProcessingStatus, VoiceError, VoiceManager, VoicePage, VoiceProfile, VoiceUpdate,
};

const DEFAULT_UPLOAD_NAME: &str = "audio.wav";

/// Public view of a voice profile. Storage paths and backend data stay
/// server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub language: String,
    pub tags: Vec<String>,
    pub original_filename: String,
    pub original_format: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub is_active: bool,
    pub processing_status: ProcessingStatus,
    pub processing_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<VoiceProfile> for VoiceResponse {
    fn from(profile: VoiceProfile) -> Self {
        Self {
            id: profile.id,
            name: profile.name,
            description: profile.description,
            language: profile.language,
            tags: profile.tags,
            original_filename: profile.original_filename,
            original_format: profile.original_format,
            duration_seconds: profile.duration_seconds,
            sample_rate: profile.sample_rate,
            is_active: profile.is_active,
            processing_status: profile.processing_status,
            processing_error: profile.processing_error,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceListResponse {
    pub items: Vec<VoiceResponse>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

impl From<VoicePage> for VoiceListResponse {
    fn from(page: VoicePage) -> Self {
        let total_pages = page.total_pages();
        Self {
            items: page.items.into_iter().map(VoiceResponse::from).collect(),
            total: page.total,
            page: page.page,
            page_size: page.page_size,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloneResponse {
    pub voice_id: Uuid,
    pub status: ProcessingStatus,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
    #[serde(default)]
    pub active_only: Option<bool>,
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Form fields of a clone upload.
#[derive(Debug, Default)]
struct CloneForm {
    audio: Option<(String, Vec<u8>)>,
    name: Option<String>,
    description: Option<String>,
    language: Option<String>,
    tags: Option<String>,
}

/// Size rejection for a body cut off by the upload limit. The measured size
/// is the declared request length, or the ceiling when none was sent.
fn oversize(headers: &HeaderMap, max_mb: u64) -> ApiError {
    let size_mb = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(|bytes| bytes as f64 / (1024.0 * 1024.0))
        .unwrap_or(max_mb as f64);
    ApiError::bad_request(AudioError::TooLarge { size_mb, max_mb }.to_string())
}

impl CloneForm {
    async fn read(
        mut multipart: Multipart,
        headers: &HeaderMap,
        max_mb: u64,
    ) -> Result<Self, ApiError> {
        let mut form = CloneForm::default();
        let bad_field = |e: MultipartError| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                warn!(max_mb, "Voice sample upload exceeded the body limit");
                return oversize(headers, max_mb);
            }
            ApiError::new(e.status(), e.body_text())
        };

        while let Some(field) = multipart.next_field().await.map_err(bad_field)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match name.as_str() {
                "audio_file" => {
                    let filename = field
                        .file_name()
                        .filter(|f| !f.is_empty())
                        .unwrap_or(DEFAULT_UPLOAD_NAME)
                        .to_string();
                    let bytes = field.bytes().await.map_err(bad_field)?;
                    form.audio = Some((filename, bytes.to_vec()));
                }
                "name" => form.name = Some(field.text().await.map_err(bad_field)?),
                "description" => form.description = Some(field.text().await.map_err(bad_field)?),
                "language" => form.language = Some(field.text().await.map_err(bad_field)?),
                "tags" => form.tags = Some(field.text().await.map_err(bad_field)?),
                _ => {}
            }
        }
        Ok(form)
    }
}

/// `POST /voices/clone`
pub async fn clone_voice<B: Backend + 'static>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CloneResponse>), ApiError> {
    let form =
        CloneForm::read(multipart, &headers, state.settings.max_voice_sample_size_mb).await?;

    let (filename, content) = form
        .audio
        .ok_or_else(|| ApiError::unprocessable("audio_file: field required"))?;
    let name = form
        .name
        .ok_or_else(|| ApiError::unprocessable("name: field required"))?;

    let mut voice = NewVoice::new(name);
    if let Some(description) = form.description.filter(|d| !d.is_empty()) {
        voice = voice.description(description);
    }
    if let Some(language) = form.language.filter(|l| !l.trim().is_empty()) {
        voice = voice.language(language.trim());
    }
    if let Some(tags) = form.tags {
        voice = voice.tags(split_tags(&tags));
    }

    let profile = with_voices(&state, move |voices| {
        voices.create(voice, &content, &filename)
    })
    .await
    .map_err(|e| match e {
        VoiceError::Invalid(detail) => ApiError::bad_request(detail),
        other => other.into(),
    })?;

    info!(voice_id = %profile.id, name = %profile.name, "Voice cloned");

    Ok((
        StatusCode::CREATED,
        Json(CloneResponse {
            voice_id: profile.id,
            status: profile.processing_status,
            message: "Voice profile created. Processing will begin shortly.".to_string(),
        }),
    ))
}

/// Run a store call off the async workers.
async fn with_voices<B, T, F>(state: &AppState<B>, f: F) -> Result<T, VoiceError>
where
    B: Backend + 'static,
    T: Send + 'static,
    F: FnOnce(&VoiceManager) -> Result<T, VoiceError> + Send + 'static,
{
    let engine = state.engine.clone();
    tokio::task::spawn_blocking(move || f(engine.voices()))
        .await
        .map_err(|e| VoiceError::IoError(std::io::Error::other(e)))?
}

/// `GET /voices`
pub async fn list_voices<B: Backend + 'static>(
    State(state): State<AppState<B>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<VoiceListResponse>, ApiError> {
    let Query(params) = params?;
    let page = with_voices(&state, move |voices| {
        voices.list(
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(20),
            params.active_only.unwrap_or(true),
        )
    })
    .await?;
    Ok(Json(page.into()))
}

/// `GET /voices/{voice_id}`
pub async fn get_voice<B: Backend + 'static>(
    State(state): State<AppState<B>>,
    Path(voice_id): Path<String>,
) -> Result<Json<VoiceResponse>, ApiError> {
    let profile = with_voices(&state, move |voices| voices.get(&voice_id)).await?;
    Ok(Json(profile.into()))
}

/// `PATCH /voices/{voice_id}`
pub async fn update_voice<B: Backend + 'static>(
    State(state): State<AppState<B>>,
    Path(voice_id): Path<String>,
    body: Result<Json<VoiceUpdate>, JsonRejection>,
) -> Result<Json<VoiceResponse>, ApiError> {
    let Json(update) = body?;
    let profile = with_voices(&state, move |voices| voices.update(&voice_id, update)).await?;
    Ok(Json(profile.into()))
}

/// `DELETE /voices/{voice_id}`
pub async fn delete_voice<B: Backend + 'static>(
    State(state): State<AppState<B>>,
    Path(voice_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = voice_id.clone();
    with_voices(&state, move |voices| voices.delete(&id)).await?;

    info!(voice_id = %voice_id, "Voice deleted");
    Ok(StatusCode::NO_CONTENT)
}
