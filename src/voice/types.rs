//! Voice profile records and the inputs that create or change them.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::audio::AudioError;

const MAX_NAME_CHARS: usize = 255;
const MAX_DESCRIPTION_CHARS: usize = 1000;
const MAX_LANGUAGE_CHARS: usize = 10;

/// Errors that can occur during voice management.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Voice not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: ProcessingStatus,
        to: ProcessingStatus,
    },

    #[error("Processed audio file not found: {0}")]
    AudioNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Where a voice profile is in its processing lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processing,
    Ready,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Ready => "ready",
            ProcessingStatus::Failed => "failed",
        }
    }

    /// Allowed moves are pending -> processing -> ready | failed.
    /// Setting the current status again is always accepted.
    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;

        *self == next
            || matches!(
                (self, next),
                (Pending, Processing) | (Processing, Ready) | (Processing, Failed)
            )
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = VoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "ready" => Ok(ProcessingStatus::Ready),
            "failed" => Ok(ProcessingStatus::Failed),
            other => Err(VoiceError::Invalid(format!(
                "Unknown processing status: {other}"
            ))),
        }
    }
}

/// A stored voice profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceProfile {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub original_filename: String,
    pub original_format: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub processed_audio_path: PathBuf,
    pub chatterbox_data: Option<Value>,
    pub orpheus_data: Option<Value>,
    pub xtts_data: Option<Value>,
    pub svara_data: Option<Value>,
    pub language: String,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub processing_status: ProcessingStatus,
    pub processing_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VoiceProfile {
    pub fn is_ready(&self) -> bool {
        self.processing_status == ProcessingStatus::Ready
    }
}

fn check_name(name: &str) -> Result<(), VoiceError> {
    if name.trim().is_empty() {
        return Err(VoiceError::Invalid("Name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(VoiceError::Invalid(format!(
            "Name cannot exceed {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(())
}

fn check_description(description: Option<&str>) -> Result<(), VoiceError> {
    match description {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_CHARS => Err(VoiceError::Invalid(
            format!("Description cannot exceed {MAX_DESCRIPTION_CHARS} characters"),
        )),
        _ => Ok(()),
    }
}

fn check_language(language: &str) -> Result<(), VoiceError> {
    if language.is_empty() || language.chars().count() > MAX_LANGUAGE_CHARS {
        return Err(VoiceError::Invalid(format!(
            "Language must be 1 to {MAX_LANGUAGE_CHARS} characters"
        )));
    }
    Ok(())
}

/// Fields supplied when cloning a new voice.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVoice {
    pub name: String,
    pub description: Option<String>,
    pub language: String,
    pub tags: Vec<String>,
}

impl NewVoice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            language: "en".to_string(),
            tags: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn validate(&self) -> Result<(), VoiceError> {
        check_name(&self.name)?;
        check_description(self.description.as_deref())?;
        check_language(&self.language)
    }
}

/// Partial update of a voice profile; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VoiceUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

impl VoiceUpdate {
    pub fn validate(&self) -> Result<(), VoiceError> {
        if let Some(name) = &self.name {
            check_name(name)?;
        }
        check_description(self.description.as_deref())?;
        if let Some(language) = &self.language {
            check_language(language)?;
        }
        Ok(())
    }

    pub(crate) fn apply(self, profile: &mut VoiceProfile) {
        if let Some(name) = self.name {
            profile.name = name;
        }
        if let Some(description) = self.description {
            profile.description = Some(description);
        }
        if let Some(language) = self.language {
            profile.language = language;
        }
        if let Some(tags) = self.tags {
            profile.tags = tags;
        }
        if let Some(is_active) = self.is_active {
            profile.is_active = is_active;
        }
    }
}

/// Per-backend embedding blobs written by the processing step.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BackendData {
    pub chatterbox: Option<Value>,
    pub orpheus: Option<Value>,
    pub xtts: Option<Value>,
    pub svara: Option<Value>,
}

impl BackendData {
    pub(crate) fn apply(self, profile: &mut VoiceProfile) {
        if let Some(data) = self.chatterbox {
            profile.chatterbox_data = Some(data);
        }
        if let Some(data) = self.orpheus {
            profile.orpheus_data = Some(data);
        }
        if let Some(data) = self.xtts {
            profile.xtts_data = Some(data);
        }
        if let Some(data) = self.svara {
            profile.svara_data = Some(data);
        }
    }
}

/// One page of voice profiles, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct VoicePage {
    pub items: Vec<VoiceProfile>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl VoicePage {
    pub fn total_pages(&self) -> u64 {
        if self.total == 0 {
            return 1;
        }
        self.total.div_ceil(self.page_size.max(1) as u64)
    }
}
