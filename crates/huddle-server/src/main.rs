//! Huddle signaling server binary.
//!
//! # Startup flow
//!
//! 1. Load configuration from environment
//! 2. Initialize the media engine and room registry
//! 3. Bind the HTTP/WebSocket listener (fail fast on bind errors)
//! 4. Serve until a shutdown signal arrives or the media worker dies
//!
//! Worker death is fatal: router state cannot be reconciled with a restarted
//! worker in-process, so the server logs, waits a short grace period for
//! in-flight responses, and exits non-zero for external supervision to
//! restart it.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use huddle_media::{LoopbackEngine, MediaEngine};
use huddle_server::config::Config;
use huddle_server::registry::RoomRegistry;
use huddle_server::{http, observability, ws};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Grace period between a fatal worker death and process exit.
const WORKER_DEATH_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Huddle signaling server");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            error!(error = %error, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    info!(
        bind_address = %config.bind_address,
        announced_ip = config.announced_ip.as_deref().unwrap_or("-"),
        rtc_min_port = config.rtc_min_port,
        rtc_max_port = config.rtc_max_port,
        "Configuration loaded successfully"
    );

    let engine = Arc::new(LoopbackEngine::new(config.engine_settings()));
    let worker_died = engine.died();
    let registry = Arc::new(RoomRegistry::new(engine));

    let app = http::api_router(Arc::clone(&registry))
        .merge(ws::ws_router(registry))
        .merge(observability::health_router())
        .layer(tower_http::trace::TraceLayer::new_for_http());

    // Bind before serving to fail fast on bind errors.
    let listener = match tokio::net::TcpListener::bind(&config.bind_address).await {
        Ok(listener) => listener,
        Err(error) => {
            error!(error = %error, addr = %config.bind_address, "Failed to bind listener");
            return ExitCode::FAILURE;
        }
    };
    info!(addr = %config.bind_address, "Server listening");

    let shutdown_token = CancellationToken::new();
    let server_token = shutdown_token.clone();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                server_token.cancelled().await;
                info!("Server shutting down");
            })
            .await;
        if let Err(error) = result {
            error!(error = %error, "Server failed");
        }
    });

    let exit_code = tokio::select! {
        () = shutdown_signal() => {
            info!("Shutdown signal received, initiating graceful shutdown");
            ExitCode::SUCCESS
        }
        () = worker_died.cancelled() => {
            error!("Media worker died, exiting for external restart");
            tokio::time::sleep(WORKER_DEATH_GRACE).await;
            ExitCode::FAILURE
        }
    };

    shutdown_token.cancel();
    // Give in-flight connections time to drain.
    tokio::time::sleep(WORKER_DEATH_GRACE).await;
    server.abort();

    info!("Huddle signaling server shutdown complete");
    exit_code
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable because
/// without signal handlers, we cannot gracefully shut down the service.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
