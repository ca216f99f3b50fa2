//! Backend communication with the remote inference service.
//!
//! [`Backend`] is the transport seam: one JSON request in, one JSON response
//! out. [`TtsClient`] sits on top and knows what each of the four models
//! needs, so callers only deal in [`SynthesisParams`] and
//! [`SynthesisResult`].

mod catalog;
mod client;
mod synthesis;
mod types;

pub use catalog::{ModelInfo, model_catalog};
pub use client::HttpBackend;
pub use synthesis::{TtsClient, decode_audio};
pub use types::{
    BackendError, DEFAULT_ORPHEUS_VOICE, DEFAULT_SAMPLE_RATE, InferenceRequest,
    InferenceResponse, ORPHEUS_EMOTIONS, ORPHEUS_VOICES, SVARA_EMOTIONS, SVARA_LANGUAGES,
    SpeakerGender, StreamItem, SynthesisParams, SynthesisResult, XTTS_LANGUAGES,
};

use async_trait::async_trait;

/// Trait for inference service communication.
///
/// This trait abstracts the HTTP call to the remote service, allowing for
/// mock implementations in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    /// Post one synthesis request and return the decoded response body.
    async fn synthesize(&self, request: &InferenceRequest)
    -> Result<InferenceResponse, BackendError>;
}

/// Create the HTTP backend for the configured endpoint.
pub fn create_backend(endpoint: &str) -> Result<HttpBackend, BackendError> {
    HttpBackend::new(endpoint)
}
