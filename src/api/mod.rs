//! HTTP and WebSocket surface of the server.
//!
//! Routes:
//! - `GET /health`, `GET /ready`
//! - `/api/v1/voices`: clone, list, get, update, delete
//! - `/api/v1/tts`: one-shot synthesis, model catalog and the two streaming
//!   sockets

mod error;
mod protocol;
mod registry;
mod tts;
mod voices;
mod websocket;

pub use error::ApiError;
pub use protocol::{ErrorCode, OutputFormat, ServerFrame, StreamEncoding, TtsRequest, TtsResponse};
pub use registry::{ConnectionRegistry, Outbound};
pub use voices::{CloneResponse, VoiceListResponse, VoiceResponse};
pub use websocket::{SessionState, StreamSession};

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use serde_json::{Value, json};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::backend::Backend;
use crate::cli::Args;
use crate::engine::TTSEngine;

/// Shared state handed to every handler.
pub struct AppState<B: Backend> {
    pub engine: Arc<TTSEngine<B>>,
    pub connections: ConnectionRegistry,
    pub settings: Arc<Args>,
}

impl<B: Backend> AppState<B> {
    pub fn new(engine: TTSEngine<B>, settings: Args) -> Self {
        Self {
            engine: Arc::new(engine),
            connections: ConnectionRegistry::new(),
            settings: Arc::new(settings),
        }
    }
}

impl<B: Backend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            connections: self.connections.clone(),
            settings: self.settings.clone(),
        }
    }
}

async fn health<B: Backend + 'static>(State(state): State<AppState<B>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "app": state.settings.app_name,
        "env": state.settings.app_env.as_str(),
        "connections": state.connections.len(),
    }))
}

async fn ready<B: Backend + 'static>(
    State(state): State<AppState<B>>,
) -> Result<Json<Value>, ApiError> {
    state.engine.voices().ping().map_err(|e| {
        warn!(error = %e, "Readiness check failed");
        ApiError::unavailable("Database unavailable")
    })?;
    Ok(Json(json!({ "status": "ready" })))
}

/// Log every 5xx with the route that produced it.
async fn log_server_errors(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    if response.status().is_server_error() {
        error!(%method, %path, status = response.status().as_u16(), "Request failed");
    }
    response
}

/// Credentialed CORS for the configured origins. A `*` entry mirrors the
/// caller's origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o.trim() == "*") {
        AllowOrigin::mirror_request()
    } else {
        let list: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match o.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(list)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Build the application router.
pub fn router<B: Backend + 'static>(state: AppState<B>) -> Router {
    let settings = state.settings.clone();

    let api = Router::new()
        .route(
            "/voices/clone",
            post(voices::clone_voice::<B>)
                .layer(DefaultBodyLimit::max(settings.max_upload_bytes())),
        )
        .route("/voices", get(voices::list_voices::<B>))
        .route(
            "/voices/{voice_id}",
            get(voices::get_voice::<B>)
                .patch(voices::update_voice::<B>)
                .delete(voices::delete_voice::<B>),
        )
        .route("/tts/synthesize", post(tts::synthesize::<B>))
        .route("/tts/synthesize/audio", post(tts::synthesize_audio::<B>))
        .route("/tts/models", get(tts::list_models::<B>))
        .route("/tts/stream", get(websocket::stream_json::<B>))
        .route("/tts/stream/binary", get(websocket::stream_binary::<B>));

    Router::new()
        .route("/health", get(health::<B>))
        .route("/ready", get(ready::<B>))
        .nest("/api/v1", api)
        .layer(middleware::from_fn(log_server_errors))
        .layer(cors_layer(&settings.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
