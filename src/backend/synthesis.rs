//! Model-aware synthesis on top of a [`Backend`] transport.

use std::path::Path;

use async_stream::try_stream;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::Stream;
use tracing::{debug, warn};

use super::Backend;
use super::types::{
    BackendError, DEFAULT_ORPHEUS_VOICE, DEFAULT_SAMPLE_RATE, InferenceRequest,
    InferenceResponse, ORPHEUS_VOICES, SVARA_EMOTIONS, SVARA_LANGUAGES, StreamItem,
    SynthesisParams, SynthesisResult, XTTS_LANGUAGES,
};
use crate::cli::TtsModel;

/// Translates [`SynthesisParams`] into the remote wire format for each model
/// and normalizes what comes back.
pub struct TtsClient<B: Backend> {
    backend: B,
}

fn check_member(
    kind: &str,
    model: TtsModel,
    value: &str,
    allowed: &[&str],
) -> Result<(), BackendError> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(BackendError::Validation(format!(
        "Unsupported {kind} for {model}: {value}. Supported: {}",
        allowed.join(", ")
    )))
}

async fn encode_file(path: &Path) -> Result<String, BackendError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|_| BackendError::FileNotFound(path.display().to_string()))?;
    Ok(STANDARD.encode(bytes))
}

fn required_reference(params: &SynthesisParams) -> Result<&Path, BackendError> {
    params.reference_audio.as_deref().ok_or_else(|| {
        BackendError::Validation(format!(
            "Reference audio is required for {} model",
            params.model
        ))
    })
}

impl<B: Backend> TtsClient<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    async fn build_request(
        &self,
        params: &SynthesisParams,
    ) -> Result<InferenceRequest, BackendError> {
        if params.text.trim().is_empty() {
            return Err(BackendError::Validation("Text cannot be empty".to_string()));
        }

        let mut request = InferenceRequest::new(params.model, params.text.clone());

        match params.model {
            TtsModel::Svara => {
                let language = params.effective_language();
                check_member("language", params.model, language, &SVARA_LANGUAGES)?;
                if let Some(emotion) = &params.emotion {
                    check_member("emotion", params.model, emotion, &SVARA_EMOTIONS)?;
                }

                request.language = Some(language.to_string());
                request.emotion = params.emotion.clone();
                request.speaker_gender = Some(params.speaker_gender);

                // Cloning is optional here; a missing file just means no prompt
                if let Some(path) = params.reference_audio.as_deref().filter(|p| p.exists()) {
                    request.audio_prompt_base64 = Some(encode_file(path).await?);
                }
            }
            TtsModel::Xtts => {
                let reference = required_reference(params)?;
                let language = params.effective_language();
                check_member("language", params.model, language, &XTTS_LANGUAGES)?;

                request.language = Some(language.to_string());
                request.audio_prompt_base64 = Some(encode_file(reference).await?);
            }
            TtsModel::Chatterbox => {
                let reference = required_reference(params)?;

                request.audio_prompt_base64 = Some(encode_file(reference).await?);
                request.exaggeration = Some(params.exaggeration);
                request.cfg_weight = Some(params.cfg_weight);
            }
            TtsModel::Orpheus => {
                let voice = params.voice.as_deref().unwrap_or(DEFAULT_ORPHEUS_VOICE);
                check_member("voice", params.model, voice, &ORPHEUS_VOICES)?;

                request.voice = Some(voice.to_string());
                // The service prepends `[emotion]` to the text itself
                request.emotion = params.emotion.clone();
            }
        }

        Ok(request)
    }

    fn normalize(
        response: InferenceResponse,
        params: &SynthesisParams,
    ) -> Result<SynthesisResult, BackendError> {
        let audio_base64 = response
            .audio_base64
            .filter(|audio| !audio.is_empty())
            .ok_or_else(|| BackendError::InvalidResponse("missing audio_base64".to_string()))?;

        Ok(SynthesisResult {
            audio_base64,
            sample_rate: response.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            duration_seconds: response.duration_seconds.unwrap_or(0.0),
            processing_time_ms: response.processing_time_ms.unwrap_or(0.0),
            model: response
                .model
                .unwrap_or_else(|| params.model.as_str().to_string()),
            language: response
                .language
                .unwrap_or_else(|| params.effective_language().to_string()),
        })
    }

    /// Synthesize speech with the model named in `params`.
    ///
    /// Model-specific checks run before anything is sent. A body carrying an
    /// `error` field is a failure even on HTTP 200.
    pub async fn synthesize(
        &self,
        params: &SynthesisParams,
    ) -> Result<SynthesisResult, BackendError> {
        let request = self.build_request(params).await?;

        debug!(
            model = %params.model,
            text_length = params.text.chars().count(),
            has_reference = request.audio_prompt_base64.is_some(),
            "Dispatching synthesis"
        );

        let response = self.backend.synthesize(&request).await?;

        if let Some(message) = response.error {
            warn!(model = %params.model, error = %message, "TTS service reported an error");
            return Err(BackendError::Remote(message));
        }

        Self::normalize(response, params)
    }

    /// Stream synthesized audio.
    ///
    /// The remote service answers in one piece, so the stream holds a single
    /// chunk followed by the final summary. Nothing is sent until the stream
    /// is first polled.
    pub fn stream(
        &self,
        params: SynthesisParams,
    ) -> impl Stream<Item = Result<StreamItem, BackendError>> + Send + '_ {
        try_stream! {
            let result = self.synthesize(&params).await?;

            yield StreamItem::Chunk {
                index: 0,
                audio_base64: result.audio_base64,
                sample_rate: result.sample_rate,
                language: result.language,
            };

            yield StreamItem::Final {
                total_chunks: 1,
                duration_seconds: result.duration_seconds,
                processing_time_ms: result.processing_time_ms,
            };
        }
    }
}

/// Decode base64 audio from a synthesis result to raw bytes.
pub fn decode_audio(audio_base64: &str) -> Result<Vec<u8>, BackendError> {
    STANDARD
        .decode(audio_base64.trim())
        .map_err(|e| BackendError::InvalidResponse(format!("invalid base64 audio: {e}")))
}
