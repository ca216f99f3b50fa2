//! voiceclone-rs: Voice cloning text-to-speech API server.
//!
//! Users upload a short voice sample, which is validated, normalized and
//! stored as a voice profile. Speech is then synthesized in that voice by a
//! remote inference service hosting one of four models (svara, XTTS,
//! Chatterbox, Orpheus), either as a one-shot HTTP request or streamed over
//! a WebSocket.

pub mod api;
pub mod audio;
pub mod backend;
pub mod cli;
pub mod engine;
pub mod voice;
