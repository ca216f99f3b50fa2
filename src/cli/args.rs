//! Server settings and TTS model selection.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::audio::AudioLimits;

/// Voice cloning text-to-speech API server.
///
/// Every option can also be supplied through the environment variable named
/// next to it, which is how the server is configured in deployments.
#[derive(Parser, Debug, Clone)]
#[command(name = "voiceclone-rs")]
#[command(about = "Voice cloning text-to-speech API server")]
#[command(version)]
pub struct Args {
    /// Application name reported by the health endpoint
    #[arg(long, env = "APP_NAME", default_value = "voiceclone")]
    pub app_name: String,

    /// Deployment environment
    #[arg(long, env = "APP_ENV", value_enum, default_value = "development")]
    pub app_env: AppEnv,

    /// Address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// SQLite database path (a `sqlite://` prefix is accepted)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// URL of the remote inference service synthesis endpoint
    #[arg(long, env = "TTS_ENDPOINT", default_value = "")]
    pub tts_endpoint: String,

    /// Directory holding one sub-directory per voice profile
    #[arg(long, env = "VOICE_STORAGE_PATH")]
    pub voice_storage_path: Option<PathBuf>,

    /// Largest accepted voice sample upload, in megabytes
    #[arg(long, env = "MAX_VOICE_SAMPLE_SIZE_MB", default_value = "50")]
    pub max_voice_sample_size_mb: u64,

    /// Accepted upload extensions
    #[arg(
        long,
        env = "ALLOWED_AUDIO_FORMATS",
        value_delimiter = ',',
        default_value = "wav,mp3,flac,ogg,m4a"
    )]
    pub allowed_audio_formats: Vec<String>,

    /// Sample rate of normalized reference audio
    #[arg(long, env = "TTS_SAMPLE_RATE", default_value = "24000")]
    pub tts_sample_rate: u32,

    /// Longest text accepted for synthesis, in characters
    #[arg(long, env = "MAX_TEXT_LENGTH", default_value = "5000")]
    pub max_text_length: usize,

    /// Model used when a synthesis request does not name one
    #[arg(long, env = "DEFAULT_TTS_MODEL", value_enum, default_value = "svara")]
    pub default_tts_model: TtsModel,

    /// Requests allowed per rate limit window (not enforced)
    #[arg(long, env = "RATE_LIMIT_REQUESTS", default_value = "100")]
    pub rate_limit_requests: u32,

    /// Rate limit window in seconds (not enforced)
    #[arg(long, env = "RATE_LIMIT_WINDOW", default_value = "60")]
    pub rate_limit_window: u64,

    /// Origins allowed by CORS
    #[arg(
        long,
        env = "CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000"
    )]
    pub cors_origins: Vec<String>,

    /// Log filter (overridden by RUST_LOG)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "json")]
    pub log_format: LogFormat,
}

impl Args {
    /// Directory used when no explicit database or storage path is set.
    fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("voiceclone")
    }

    /// Resolve the SQLite database file path.
    pub fn database_path(&self) -> PathBuf {
        match &self.database_url {
            Some(url) => {
                let path = url
                    .strip_prefix("sqlite:///")
                    .map(|p| format!("/{p}"))
                    .or_else(|| url.strip_prefix("sqlite://").map(str::to_string))
                    .unwrap_or_else(|| url.clone());
                PathBuf::from(path)
            }
            None => Self::data_dir().join("voiceclone.db"),
        }
    }

    /// Resolve the voice storage directory.
    pub fn storage_path(&self) -> PathBuf {
        self.voice_storage_path
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("voices"))
    }

    /// Upload validation limits derived from the settings.
    pub fn audio_limits(&self) -> AudioLimits {
        AudioLimits {
            max_size_mb: self.max_voice_sample_size_mb,
            allowed_formats: self
                .allowed_audio_formats
                .iter()
                .map(|f| f.trim().trim_start_matches('.').to_lowercase())
                .filter(|f| !f.is_empty())
                .collect(),
            ..AudioLimits::default()
        }
    }

    /// Request body ceiling for the upload route, with room for form fields.
    pub fn max_upload_bytes(&self) -> usize {
        ((self.max_voice_sample_size_mb + 1) * 1024 * 1024) as usize
    }
}

impl Default for Args {
    fn default() -> Self {
        Self::parse_from(["voiceclone-rs"])
    }
}

/// Deployment environment.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AppEnv {
    #[default]
    Development,
    Staging,
    Production,
}

impl AppEnv {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppEnv::Development => "development",
            AppEnv::Staging => "staging",
            AppEnv::Production => "production",
        }
    }
}

/// Log output format.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Console,
}

/// Remote synthesis backend selection.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsModel {
    /// svara-TTS (Indian languages, emotion tags)
    #[default]
    Svara,

    /// XTTS-v2 (multilingual voice cloning)
    Xtts,

    /// Chatterbox (English voice cloning)
    Chatterbox,

    /// Orpheus (English preset voices)
    Orpheus,
}

impl TtsModel {
    pub const ALL: [TtsModel; 4] = [
        TtsModel::Svara,
        TtsModel::Xtts,
        TtsModel::Chatterbox,
        TtsModel::Orpheus,
    ];

    /// Returns the wire identifier for this model.
    pub fn as_str(&self) -> &'static str {
        match self {
            TtsModel::Svara => "svara",
            TtsModel::Xtts => "xtts",
            TtsModel::Chatterbox => "chatterbox",
            TtsModel::Orpheus => "orpheus",
        }
    }

    /// Returns the human-readable name of the model.
    pub fn name(&self) -> &'static str {
        match self {
            TtsModel::Svara => "svara-TTS",
            TtsModel::Xtts => "XTTS-v2",
            TtsModel::Chatterbox => "Chatterbox",
            TtsModel::Orpheus => "Orpheus",
        }
    }

    /// Whether a reference sample must accompany every request.
    pub fn requires_reference_audio(&self) -> bool {
        matches!(self, TtsModel::Xtts | TtsModel::Chatterbox)
    }

    /// Whether the model conditions on a reference sample at all.
    pub fn accepts_reference_audio(&self) -> bool {
        !matches!(self, TtsModel::Orpheus)
    }
}

impl std::fmt::Display for TtsModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
