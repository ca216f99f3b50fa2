//! voiceclone-rs server entry point.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use voiceclone_rs::api::{self, AppState};
use voiceclone_rs::backend::create_backend;
use voiceclone_rs::cli::{Args, LogFormat};
use voiceclone_rs::engine::TTSEngine;
use voiceclone_rs::voice::{VoiceManager, VoiceStore};

fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match args.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Console => builder.init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    let database_path = args.database_path();
    let store = VoiceStore::open(&database_path)
        .with_context(|| format!("Failed to open database {}", database_path.display()))?;

    let storage_path = args.storage_path();
    std::fs::create_dir_all(&storage_path).with_context(|| {
        format!("Failed to create voice storage {}", storage_path.display())
    })?;

    let voice_manager = VoiceManager::new(
        store,
        storage_path.clone(),
        args.audio_limits(),
        args.tts_sample_rate,
    );
    let backend = create_backend(&args.tts_endpoint)?;
    if args.tts_endpoint.is_empty() {
        tracing::warn!("TTS_ENDPOINT is not set; synthesis requests will fail");
    }
    let engine = TTSEngine::new(backend, voice_manager);

    let addr = format!("{}:{}", args.host, args.port);
    info!(
        app = %args.app_name,
        env = args.app_env.as_str(),
        database = %database_path.display(),
        storage = %storage_path.display(),
        default_model = %args.default_tts_model,
        "Starting server"
    );

    let app = api::router(AppState::new(engine, args));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
