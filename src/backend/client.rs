//! HTTP client for the remote inference service.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

use super::Backend;
use super::types::{BackendError, InferenceRequest, InferenceResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP-based backend posting JSON to a single synthesis endpoint.
pub struct HttpBackend {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Create a new HTTP backend client.
    ///
    /// An empty endpoint is accepted here so the server can start without
    /// one; every request then fails with [`BackendError::NotConfigured`].
    pub fn new(endpoint: impl Into<String>) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn synthesize(
        &self,
        request: &InferenceRequest,
    ) -> Result<InferenceResponse, BackendError> {
        if self.endpoint.is_empty() {
            return Err(BackendError::NotConfigured);
        }

        debug!(endpoint = %self.endpoint, model = %request.model, "Posting synthesis request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP error during TTS request");
                BackendError::ConnectionFailed(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "TTS service returned an error status");
            return Err(BackendError::RequestFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        response
            .json::<InferenceResponse>()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}
