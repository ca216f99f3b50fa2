//! Command-line and environment configuration.

mod args;

pub use args::{AppEnv, Args, LogFormat, TtsModel};
