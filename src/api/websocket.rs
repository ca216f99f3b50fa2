//! Streaming synthesis over WebSocket.
//!
//! Each socket serves any number of sequential requests. A request is one
//! JSON text frame; the reply is `start`, the audio, then `end`, or a single
//! `error` frame. Errors never close the socket.

use std::time::Instant;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AppState;
use super::protocol::{ErrorCode, ServerFrame, StreamEncoding, TtsRequest};
use super::registry::Outbound;
use crate::backend::{Backend, StreamItem, decode_audio};
use crate::engine::TTSError;
use crate::voice::VoiceError;

/// `GET /api/v1/tts/stream`: audio as base64 `chunk` frames.
pub async fn stream_json<B: Backend + 'static>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<B>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, StreamEncoding::Json))
}

/// `GET /api/v1/tts/stream/binary`: audio as raw binary frames.
pub async fn stream_binary<B: Backend + 'static>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<B>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, StreamEncoding::Binary))
}

fn encode(message: Outbound) -> Option<Message> {
    match message {
        Outbound::Frame(frame) => match serde_json::to_string(&frame) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(e) => {
                warn!(error = %e, "Failed to serialize frame");
                None
            }
        },
        Outbound::Audio(bytes) => Some(Message::Binary(bytes.into())),
    }
}

async fn handle_socket<B: Backend + 'static>(
    socket: WebSocket,
    state: AppState<B>,
    encoding: StreamEncoding,
) {
    let (mut sender, mut receiver) = socket.split();
    let (client_id, mut outbound) = state.connections.register();
    info!(client_id = %client_id, ?encoding, "WebSocket connected");

    // Drains until the connection is unregistered
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let Some(message) = encode(message) else {
                continue;
            };
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut session = StreamSession::new(client_id, encoding, state.clone());

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => session.handle_text(text.as_str()).await,
            Ok(Message::Binary(_)) => session.reject_binary(),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(client_id = %client_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    state.connections.unregister(&client_id);
    if let Err(e) = writer.await {
        warn!(client_id = %client_id, error = %e, "WebSocket writer task failed");
    }
    info!(client_id = %client_id, "WebSocket disconnected");
}

/// Where a session is in handling the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingRequest,
    Dispatching,
    StreamingChunks,
    ErrorSent,
}

fn error_code(err: &TTSError) -> ErrorCode {
    match err {
        TTSError::VoiceNotFound(_) | TTSError::VoiceError(VoiceError::NotFound(_)) => {
            ErrorCode::VoiceNotFound
        }
        TTSError::VoiceNotReady(_) => ErrorCode::VoiceNotReady,
        TTSError::AudioPath(_) | TTSError::VoiceError(VoiceError::AudioNotFound(_)) => {
            ErrorCode::AudioPathError
        }
        TTSError::BackendError(_) | TTSError::VoiceError(_) => ErrorCode::TtsError,
    }
}

/// Per-connection request state machine.
///
/// `Idle -> AwaitingRequest -> Dispatching -> StreamingChunks -> Idle`, with
/// any failure going through `ErrorSent` back to `Idle`.
pub struct StreamSession<B: Backend> {
    client_id: Uuid,
    encoding: StreamEncoding,
    app: AppState<B>,
    state: SessionState,
}

impl<B: Backend + 'static> StreamSession<B> {
    pub fn new(client_id: Uuid, encoding: StreamEncoding, app: AppState<B>) -> Self {
        Self {
            client_id,
            encoding,
            app,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!(client_id = %self.client_id, from = ?self.state, to = ?next, "Session transition");
        self.state = next;
    }

    fn send(&self, frame: ServerFrame) {
        if !self.app.connections.send_json(&self.client_id, frame) {
            debug!(client_id = %self.client_id, "Dropping frame for closed connection");
        }
    }

    fn fail(&mut self, code: ErrorCode, message: impl Into<String>) {
        self.transition(SessionState::ErrorSent);
        self.send(ServerFrame::error(code, message));
        self.transition(SessionState::Idle);
    }

    /// Binary frames never carry requests.
    pub fn reject_binary(&mut self) {
        self.fail(
            ErrorCode::ValidationError,
            "Binary messages are not accepted; send the request as a JSON text frame",
        );
    }

    fn parse(&mut self, text: &str) -> Option<TtsRequest> {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(_) => {
                self.fail(ErrorCode::InvalidJson, "Invalid JSON");
                return None;
            }
        };

        let request: TtsRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                self.fail(ErrorCode::ValidationError, format!("Validation error: {e}"));
                return None;
            }
        };

        if let Err(message) = request.validate(self.app.settings.max_text_length) {
            self.fail(ErrorCode::ValidationError, format!("Validation error: {message}"));
            return None;
        }

        Some(request)
    }

    /// Handle one request frame through to its final frame.
    pub async fn handle_text(&mut self, text: &str) {
        self.transition(SessionState::AwaitingRequest);
        let Some(request) = self.parse(text) else {
            return;
        };

        self.transition(SessionState::Dispatching);
        let speech = request.to_speech(self.app.settings.default_tts_model);
        let engine = self.app.engine.clone();

        let prepared = match engine.prepare(&speech.voice_id, speech.model) {
            Ok(prepared) => prepared,
            Err(e) => {
                self.fail(error_code(&e), e.to_string());
                return;
            }
        };

        self.send(ServerFrame::Start {
            voice_id: request.voice_id,
            model: speech.model,
            sample_rate: self.app.settings.tts_sample_rate,
        });
        self.transition(SessionState::StreamingChunks);

        let started = Instant::now();
        let mut total_chunks = 0u32;
        let stream = engine.stream(&speech, &prepared);
        futures::pin_mut!(stream);

        while let Some(item) = stream.next().await {
            match item {
                Ok(StreamItem::Chunk {
                    index,
                    audio_base64,
                    sample_rate,
                    ..
                }) => {
                    match self.encoding {
                        StreamEncoding::Json => self.send(ServerFrame::Chunk {
                            chunk_index: index,
                            audio_base64,
                            is_final: false,
                            sample_rate,
                        }),
                        StreamEncoding::Binary => match decode_audio(&audio_base64) {
                            Ok(bytes) => {
                                self.app.connections.send_bytes(&self.client_id, bytes);
                            }
                            Err(e) => {
                                self.fail(ErrorCode::TtsError, e.to_string());
                                return;
                            }
                        },
                    }
                    total_chunks += 1;
                }
                Ok(StreamItem::Final {
                    duration_seconds, ..
                }) => {
                    let processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;
                    self.send(ServerFrame::End {
                        total_chunks,
                        total_duration_seconds: duration_seconds,
                        processing_time_ms,
                    });
                    info!(
                        client_id = %self.client_id,
                        voice_id = %request.voice_id,
                        model = %speech.model,
                        total_chunks,
                        processing_time_ms,
                        "Stream completed"
                    );
                    self.transition(SessionState::Idle);
                    return;
                }
                Err(e) => {
                    warn!(client_id = %self.client_id, error = %e, "Streaming synthesis failed");
                    self.fail(error_code(&e), e.to_string());
                    return;
                }
            }
        }

        self.transition(SessionState::Idle);
    }
}
