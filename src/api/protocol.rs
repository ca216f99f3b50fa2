//! Request bodies and streaming frames shared by the HTTP and WebSocket
//! synthesis endpoints.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::SpeakerGender;
use crate::cli::TtsModel;
use crate::engine::SpeechRequest;

const MIN_SPEED: f32 = 0.5;
const MAX_SPEED: f32 = 2.0;
const MAX_EXAGGERATION: f32 = 2.0;
const MAX_CFG_WEIGHT: f32 = 1.0;

fn default_language() -> String {
    "hi".to_string()
}

fn default_speed() -> f32 {
    1.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Wav,
    Mp3,
}

impl OutputFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "audio/wav",
            OutputFormat::Mp3 => "audio/mpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Mp3 => "mp3",
        }
    }
}

/// Synthesis request body. The WebSocket endpoints accept the same shape
/// and ignore `speed` and `output_format`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    pub voice_id: Uuid,
    /// Falls back to the configured default model.
    #[serde(default)]
    pub model: Option<TtsModel>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub speaker_gender: SpeakerGender,
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default)]
    pub output_format: OutputFormat,
    /// Orpheus preset voice.
    #[serde(default)]
    pub voice: Option<String>,
    /// Chatterbox emotion exaggeration.
    #[serde(default)]
    pub exaggeration: Option<f32>,
    /// Chatterbox classifier-free guidance weight.
    #[serde(default)]
    pub cfg_weight: Option<f32>,
}

impl TtsRequest {
    /// Range checks serde cannot express.
    pub fn validate(&self, max_text_length: usize) -> Result<(), String> {
        let length = self.text.chars().count();
        if length == 0 {
            return Err("text: must contain at least 1 character".to_string());
        }
        if length > max_text_length {
            return Err(format!(
                "text: must contain at most {max_text_length} characters"
            ));
        }
        if !(MIN_SPEED..=MAX_SPEED).contains(&self.speed) {
            return Err(format!(
                "speed: must be between {MIN_SPEED} and {MAX_SPEED}"
            ));
        }
        if self
            .exaggeration
            .is_some_and(|e| !(0.0..=MAX_EXAGGERATION).contains(&e))
        {
            return Err(format!(
                "exaggeration: must be between 0 and {MAX_EXAGGERATION}"
            ));
        }
        if self
            .cfg_weight
            .is_some_and(|w| !(0.0..=MAX_CFG_WEIGHT).contains(&w))
        {
            return Err(format!("cfg_weight: must be between 0 and {MAX_CFG_WEIGHT}"));
        }
        Ok(())
    }

    pub fn model_or(&self, default: TtsModel) -> TtsModel {
        self.model.unwrap_or(default)
    }

    pub fn to_speech(&self, default_model: TtsModel) -> SpeechRequest {
        let mut speech = SpeechRequest::new(
            self.text.clone(),
            self.voice_id.to_string(),
            self.model_or(default_model),
        );
        speech.language = self.language.clone();
        speech.emotion = self.emotion.clone();
        speech.speaker_gender = self.speaker_gender;
        speech.voice = self.voice.clone();
        speech.speed = self.speed;
        speech.exaggeration = self.exaggeration;
        speech.cfg_weight = self.cfg_weight;
        speech
    }
}

/// Body of `POST /tts/synthesize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsResponse {
    pub audio_url: String,
    pub duration_seconds: f64,
    pub model_used: String,
    pub processing_time_ms: f64,
}

/// Machine-readable reason carried by an error frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    VoiceNotFound,
    VoiceNotReady,
    TtsError,
    InvalidJson,
    ValidationError,
    AudioPathError,
}

/// JSON frames sent by the server on a streaming socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    Start {
        voice_id: Uuid,
        model: TtsModel,
        sample_rate: u32,
    },
    Chunk {
        chunk_index: u32,
        audio_base64: String,
        is_final: bool,
        sample_rate: u32,
    },
    End {
        total_chunks: u32,
        total_duration_seconds: f64,
        processing_time_ms: f64,
    },
    Error {
        error: String,
        code: ErrorCode,
    },
}

impl ServerFrame {
    pub fn error(code: ErrorCode, error: impl Into<String>) -> Self {
        ServerFrame::Error {
            error: error.into(),
            code,
        }
    }
}

/// How audio chunks travel on a streaming socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEncoding {
    /// Base64 inside `chunk` frames.
    Json,
    /// Raw bytes in binary frames.
    Binary,
}
