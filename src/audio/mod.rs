//! Audio validation and normalization for voice samples.

mod processing;

pub use processing::{
    AudioError, AudioInfo, AudioLimits, audio_to_base64, base64_to_audio, file_extension,
    get_audio_info, normalize_audio, resample, validate_audio,
};
