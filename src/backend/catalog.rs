//! Static description of the synthesis models.

use serde::Serialize;

use super::types::{ORPHEUS_EMOTIONS, ORPHEUS_VOICES, SVARA_EMOTIONS, SVARA_LANGUAGES, XTTS_LANGUAGES};
use crate::cli::TtsModel;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub id: TtsModel,
    pub name: &'static str,
    pub description: &'static str,
    pub features: Vec<&'static str>,
    pub requires_reference_audio: bool,
    pub supported_languages: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub emotion_tags: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub preset_voices: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_for: Option<&'static str>,
}

impl ModelInfo {
    pub fn for_model(model: TtsModel) -> Self {
        let base = Self {
            id: model,
            name: model.name(),
            description: "",
            features: Vec::new(),
            requires_reference_audio: model.requires_reference_audio(),
            supported_languages: vec!["en"],
            emotion_tags: Vec::new(),
            preset_voices: Vec::new(),
            recommended_for: None,
        };

        match model {
            TtsModel::Svara => Self {
                description: "Indian languages TTS with emotion control",
                features: vec!["emotion_tags", "indian_languages", "voice_cloning"],
                supported_languages: SVARA_LANGUAGES.to_vec(),
                emotion_tags: SVARA_EMOTIONS.to_vec(),
                recommended_for: Some("Hindi and Indian languages"),
                ..base
            },
            TtsModel::Xtts => Self {
                description: "Multilingual voice cloning with 17 languages",
                features: vec!["voice_cloning", "multilingual"],
                supported_languages: XTTS_LANGUAGES.to_vec(),
                ..base
            },
            TtsModel::Chatterbox => Self {
                description: "English voice cloning with emotion exaggeration control",
                features: vec!["voice_cloning", "emotion_exaggeration"],
                ..base
            },
            TtsModel::Orpheus => Self {
                description: "Emotional speech synthesis with preset voices",
                features: vec!["emotion_tags", "preset_voices"],
                emotion_tags: ORPHEUS_EMOTIONS.to_vec(),
                preset_voices: ORPHEUS_VOICES.to_vec(),
                ..base
            },
        }
    }
}

/// Models offered by the service, in preference order.
pub fn model_catalog() -> Vec<ModelInfo> {
    TtsModel::ALL.into_iter().map(ModelInfo::for_model).collect()
}
