//! Budget API server
//!
//! Serves the REST API and runs the reset-token cleanup job.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use budget_api::api::{create_router, AppState};
use budget_api::config::ServerConfig;
use budget_api::shutdown::{fatal_channel, install_panic_hook, wait_for_shutdown};
use budget_api::tasks::CleanupScheduler;

/// Longest wait for in-flight cleanup passes before the store is disconnected.
const PASS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Main entry point for the budget server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the token store and router
/// 4. Bind the listener, then start the cleanup job in the background
/// 5. Serve until SIGINT, SIGTERM or a panic
/// 6. Stop the cleanup job, drain connections and in-flight passes,
///    disconnect the store
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "budget_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    info!(
        "Configuration loaded: host={}, port={}, serverless={}, cleanup_interval={}s",
        config.host, config.port, config.serverless, config.cleanup_interval_secs
    );

    let state = AppState::in_memory();
    let app = create_router(state.clone());

    if config.serverless {
        // The platform owns the listener; the cleanup job is not started here
        info!("Serverless hosting detected, not starting listener or cleanup job");
        return Ok(());
    }

    let (reporter, fatal_rx) = fatal_channel();
    install_panic_hook(reporter);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server is running on http://{}", addr);

    let scheduler = Arc::new(
        CleanupScheduler::new(state.tokens.clone(), config.cleanup_interval())
            .with_skip_overlap(config.skip_overlapping_passes),
    );
    // A slow store must not hold up serving or signal handling
    let starting = scheduler.start_in_background();

    let (passes_tx, passes_rx) = oneshot::channel();
    let shutdown_scheduler = scheduler.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let reason = wait_for_shutdown(fatal_rx).await;
            info!("Received {}. Shutting down...", reason);
            starting.abort();
            let _ = passes_tx.send(shutdown_scheduler.stop().await);
        })
        .await
        .context("server error")?;

    if let Ok(passes) = passes_rx.await {
        if !passes.is_empty()
            && tokio::time::timeout(PASS_DRAIN_TIMEOUT, passes.wait())
                .await
                .is_err()
        {
            warn!(
                "Cleanup passes still running after {}s, abandoning them",
                PASS_DRAIN_TIMEOUT.as_secs()
            );
        }
    }

    if let Err(e) = state.tokens.disconnect().await {
        warn!("Error disconnecting store: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}
