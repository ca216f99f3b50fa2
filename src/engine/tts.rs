//! TTS Engine implementation.

use std::path::PathBuf;
use std::time::Instant;

use futures::{Stream, StreamExt};
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::{
    Backend, BackendError, ModelInfo, SpeakerGender, StreamItem, SynthesisParams,
    SynthesisResult, TtsClient, model_catalog,
};
use crate::cli::TtsModel;
use crate::voice::{ProcessingStatus, VoiceError, VoiceManager, VoiceProfile};

/// Errors that can occur during TTS operations.
#[derive(Error, Debug)]
pub enum TTSError {
    #[error("Voice not found: {0}")]
    VoiceNotFound(String),

    #[error("Voice is not ready for synthesis. Status: {0}")]
    VoiceNotReady(ProcessingStatus),

    #[error("Voice audio not available: {0}")]
    AudioPath(String),

    #[error("TTS service error: {0}")]
    BackendError(#[from] BackendError),

    #[error("Voice management error: {0}")]
    VoiceError(#[from] VoiceError),
}

/// A synthesis request against a stored voice.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice_id: String,
    pub model: TtsModel,
    pub language: String,
    pub emotion: Option<String>,
    pub speaker_gender: SpeakerGender,
    /// Orpheus preset voice.
    pub voice: Option<String>,
    /// Accepted for API compatibility; not forwarded to any model.
    pub speed: f32,
    /// Chatterbox tuning; the model default applies when unset.
    pub exaggeration: Option<f32>,
    pub cfg_weight: Option<f32>,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, voice_id: impl Into<String>, model: TtsModel) -> Self {
        Self {
            text: text.into(),
            voice_id: voice_id.into(),
            model,
            language: "hi".to_string(),
            emotion: None,
            speaker_gender: SpeakerGender::default(),
            voice: None,
            speed: 1.0,
            exaggeration: None,
            cfg_weight: None,
        }
    }
}

/// A voice that passed the readiness checks.
#[derive(Debug, Clone)]
pub struct PreparedVoice {
    pub profile: VoiceProfile,
    /// Normalized sample, present for every model that conditions on one.
    pub reference_audio: Option<PathBuf>,
}

/// Result of a one-shot synthesis.
#[derive(Debug, Clone)]
pub struct SpeechOutput {
    pub result: SynthesisResult,
    /// Wall time spent here, remote call included.
    pub processing_time_ms: f64,
}

/// The main TTS engine that orchestrates between components.
pub struct TTSEngine<B: Backend> {
    client: TtsClient<B>,
    voice_manager: VoiceManager,
}

impl<B: Backend> TTSEngine<B> {
    /// Create a new TTS engine.
    pub fn new(backend: B, voice_manager: VoiceManager) -> Self {
        Self {
            client: TtsClient::new(backend),
            voice_manager,
        }
    }

    pub fn voices(&self) -> &VoiceManager {
        &self.voice_manager
    }

    /// Capabilities of every model the engine can dispatch to.
    pub fn models(&self) -> Vec<ModelInfo> {
        model_catalog()
    }

    /// Look up a voice and check it can be synthesized with `model`.
    ///
    /// Fails before any remote call when the voice is missing, not ready, or
    /// its reference audio is gone.
    pub fn prepare(&self, voice_id: &str, model: TtsModel) -> Result<PreparedVoice, TTSError> {
        let profile = self.voice_manager.get(voice_id).map_err(|e| match e {
            VoiceError::NotFound(_) => TTSError::VoiceNotFound(voice_id.to_string()),
            other => TTSError::VoiceError(other),
        })?;

        if !profile.is_ready() {
            return Err(TTSError::VoiceNotReady(profile.processing_status));
        }

        let reference_audio = if model.accepts_reference_audio() {
            let path = VoiceManager::existing_audio_path(&profile).map_err(|e| {
                warn!(voice_id, error = %e, "Reference audio missing for ready voice");
                TTSError::AudioPath(e.to_string())
            })?;
            Some(path)
        } else {
            None
        };

        Ok(PreparedVoice {
            profile,
            reference_audio,
        })
    }

    fn params(request: &SpeechRequest, prepared: &PreparedVoice) -> SynthesisParams {
        let mut params = SynthesisParams::new(request.text.clone(), request.model)
            .with_language(request.language.clone())
            .with_speaker_gender(request.speaker_gender);

        if let Some(path) = &prepared.reference_audio {
            params = params.with_reference_audio(path.clone());
        }
        if let Some(emotion) = &request.emotion {
            params = params.with_emotion(emotion.clone());
        }
        if let Some(voice) = &request.voice {
            params = params.with_voice(voice.clone());
        }
        if let Some(exaggeration) = request.exaggeration {
            params = params.with_exaggeration(exaggeration);
        }
        if let Some(cfg_weight) = request.cfg_weight {
            params = params.with_cfg_weight(cfg_weight);
        }
        params
    }

    /// Synthesize speech in a stored voice.
    pub async fn synthesize(&self, request: &SpeechRequest) -> Result<SpeechOutput, TTSError> {
        let started = Instant::now();
        let prepared = self.prepare(&request.voice_id, request.model)?;

        let result = self
            .client
            .synthesize(&Self::params(request, &prepared))
            .await?;
        let processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        info!(
            voice_id = %request.voice_id,
            model = %request.model,
            duration = result.duration_seconds,
            processing_time_ms,
            "Synthesis completed"
        );

        Ok(SpeechOutput {
            result,
            processing_time_ms,
        })
    }

    /// Stream speech for a voice already checked by [`TTSEngine::prepare`].
    pub fn stream(
        &self,
        request: &SpeechRequest,
        prepared: &PreparedVoice,
    ) -> impl Stream<Item = Result<StreamItem, TTSError>> + Send + '_ {
        self.client
            .stream(Self::params(request, prepared))
            .map(|item| item.map_err(TTSError::from))
    }
}
