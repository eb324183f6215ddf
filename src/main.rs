//! # ADPCM Recorder - Main Application Entry Point
//!
//! HTTP server that receives IMA ADPCM voice recordings from an embedded
//! device, converts them to canonical 16-bit PCM WAV files, optionally
//! transcribes them with Whisper, and serves them back with byte-range
//! support for browser playback.
//!
//! ## Application Architecture:
//! - **audio**: ADPCM decoder, WAV reader/writer, upload conversion
//! - **streaming**: HTTP `Range` resolution and chunked file streaming
//! - **storage**: Upload directory naming, saving and listing
//! - **transcription**: Optional Whisper speech-to-text (Candle-rs)
//! - **config**: Application configuration (TOML files + environment variables)
//! - **state**: Shared application state and metrics
//! - **health**: Health and metrics endpoints
//! - **middleware**: Request logging and metrics collection
//! - **handlers**: HTTP request handlers
//! - **error**: Error types and their HTTP responses

mod audio;
mod config;
mod device;
mod error;
mod handlers;
mod health;
mod middleware;
mod state;
mod storage;
mod streaming;
mod transcription;

use actix_cors::Cors;
use actix_web::{middleware::from_fn, web, App, HttpServer};
use anyhow::{Context, Result};
use config::AppConfig;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transcription::{model::ModelSize, Transcriber, WhisperTranscriber};

/// Set once a termination signal arrives.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

/// ## Startup sequence:
/// 1. Load `.env`, set up tracing, load and validate configuration
/// 2. Create the upload directory
/// 3. Load the Whisper model if transcription is enabled
/// 4. Serve until the server exits or a shutdown signal arrives
#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting adpcm-recorder v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    let mut app_state = AppState::new(config.clone());
    app_state
        .store
        .ensure_dir()
        .await
        .with_context(|| format!("Failed to create upload directory {}", config.storage.upload_dir))?;
    info!("Storing recordings in {}", app_state.store.root().display());

    if config.transcription.enabled {
        app_state = app_state.with_transcriber(load_transcriber(&config).await?);
    } else {
        info!("Transcription disabled");
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .expose_headers(vec![
                actix_web::http::header::CONTENT_RANGE,
                actix_web::http::header::ACCEPT_RANGES,
            ])
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            // Middleware runs in reverse registration order for responses
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(from_fn(middleware::record_metrics))
            .wrap(from_fn(middleware::log_requests))
            .configure(handlers::configure)
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Load the configured Whisper model on the configured device.
async fn load_transcriber(config: &AppConfig) -> Result<Arc<dyn Transcriber>> {
    let size: ModelSize = config.transcription.model.parse()?;
    let device = device::device_from_config(&config.transcription.device);
    info!(
        "Loading Whisper {} (~{} MB) on {}",
        size,
        size.size_mb(),
        device::device_label(&device)
    );

    let transcriber = WhisperTranscriber::load(size, device)
        .await
        .with_context(|| format!("Failed to load Whisper {} model", size))?;
    info!("Transcriber {} ready", transcriber.name());
    Ok(Arc::new(transcriber))
}

/// Structured logging to stdout.
///
/// `RUST_LOG` overrides the default filter
/// `adpcm_recorder=debug,actix_web=info`.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adpcm_recorder=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

/// Flip [`SHUTDOWN_SIGNAL`] on SIGTERM or SIGINT.
fn setup_signal_handlers() {
    tokio::spawn(async {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                    (Err(e), _) | (_, Err(e)) => {
                        warn!("Failed to install signal handlers: {}", e);
                        return;
                    }
                };

            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM"),
                _ = sigint.recv() => info!("Received SIGINT"),
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                return;
            }
            info!("Received Ctrl+C");
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
