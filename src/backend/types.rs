//! Remote inference wire types and synthesis parameters.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::TtsModel;

/// Sample rate assumed when the remote service omits one.
pub const DEFAULT_SAMPLE_RATE: u32 = 24000;

/// Preset voice used by orpheus when none is requested.
pub const DEFAULT_ORPHEUS_VOICE: &str = "tara";

/// Languages accepted by the multilingual cloning model.
pub const XTTS_LANGUAGES: [&str; 17] = [
    "en", "es", "fr", "de", "it", "pt", "pl", "tr", "ru", "nl", "cs", "ar", "zh-cn", "ja", "hu",
    "ko", "hi",
];

/// Languages accepted by the regional model.
pub const SVARA_LANGUAGES: [&str; 20] = [
    "hi", "bn", "mr", "te", "kn", "ta", "gu", "ml", "pa", "as", "or", "bo", "doi", "bho", "mai",
    "mag", "cg", "ne", "sa", "en-in",
];

pub const SVARA_EMOTIONS: [&str; 5] = ["happy", "sad", "anger", "fear", "neutral"];

pub const ORPHEUS_VOICES: [&str; 8] = ["tara", "leah", "jess", "leo", "dan", "mia", "zac", "zoe"];

/// Emotion tags the orpheus service understands.
pub const ORPHEUS_EMOTIONS: [&str; 5] = ["happy", "sad", "angry", "surprised", "neutral"];

/// Errors that can occur when communicating with the inference service.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("TTS endpoint is not configured")]
    NotConfigured,

    #[error("Failed to connect to TTS service: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("TTS error: {0}")]
    Remote(String),

    /// The request was rejected before anything was sent.
    #[error("{0}")]
    Validation(String),

    #[error("Audio file not found: {0}")]
    FileNotFound(String),
}

impl BackendError {
    /// Whether the failure was caught locally rather than reported upstream.
    pub fn is_validation(&self) -> bool {
        matches!(self, BackendError::Validation(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerGender {
    Male,
    #[default]
    Female,
}

/// JSON body posted to the inference endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub model: TtsModel,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_prompt_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exaggeration: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfg_weight: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_gender: Option<SpeakerGender>,
}

impl InferenceRequest {
    pub fn new(model: TtsModel, text: impl Into<String>) -> Self {
        Self {
            model,
            text: text.into(),
            audio_prompt_base64: None,
            language: None,
            voice: None,
            emotion: None,
            exaggeration: None,
            cfg_weight: None,
            speaker_gender: None,
        }
    }
}

/// Body returned by the inference endpoint. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Model-independent synthesis parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisParams {
    pub text: String,
    pub model: TtsModel,
    pub reference_audio: Option<PathBuf>,
    pub language: Option<String>,
    pub voice: Option<String>,
    pub emotion: Option<String>,
    pub speaker_gender: SpeakerGender,
    pub exaggeration: f32,
    pub cfg_weight: f32,
}

impl SynthesisParams {
    /// Create parameters with the model defaults.
    pub fn new(text: impl Into<String>, model: TtsModel) -> Self {
        Self {
            text: text.into(),
            model,
            reference_audio: None,
            language: None,
            voice: None,
            emotion: None,
            speaker_gender: SpeakerGender::default(),
            exaggeration: 0.5,
            cfg_weight: 0.5,
        }
    }

    pub fn with_reference_audio(mut self, path: PathBuf) -> Self {
        self.reference_audio = Some(path);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Set the orpheus preset voice.
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_emotion(mut self, emotion: impl Into<String>) -> Self {
        self.emotion = Some(emotion.into());
        self
    }

    pub fn with_speaker_gender(mut self, gender: SpeakerGender) -> Self {
        self.speaker_gender = gender;
        self
    }

    pub fn with_exaggeration(mut self, exaggeration: f32) -> Self {
        self.exaggeration = exaggeration;
        self
    }

    pub fn with_cfg_weight(mut self, cfg_weight: f32) -> Self {
        self.cfg_weight = cfg_weight;
        self
    }

    /// Language the request is made in, after model defaults.
    pub fn effective_language(&self) -> &str {
        match (self.model, self.language.as_deref()) {
            (TtsModel::Chatterbox | TtsModel::Orpheus, _) => "en",
            (_, Some(language)) => language,
            (TtsModel::Svara, None) => "hi",
            (_, None) => "en",
        }
    }
}

/// Normalized synthesis outcome shared by all models.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisResult {
    pub audio_base64: String,
    pub sample_rate: u32,
    pub duration_seconds: f64,
    pub processing_time_ms: f64,
    pub model: String,
    pub language: String,
}

/// One element of a synthesis stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Chunk {
        index: u32,
        audio_base64: String,
        sample_rate: u32,
        language: String,
    },
    Final {
        total_chunks: u32,
        duration_seconds: f64,
        processing_time_ms: f64,
    },
}
