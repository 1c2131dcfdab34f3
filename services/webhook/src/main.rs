//! agent-scaler webhook dispatcher
//!
//! HTTP front end for the dispatcher. Azure DevOps service hooks post job
//! lifecycle events to `/webhook`; each queued job raises the desired count
//! of the configured ECS service by one.

use agent_scaler_webhook::{api, config, state::AppState, telemetry, Dispatcher};
use anyhow::{Context, Result};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to AGENT_SCALER_LOG_LEVEL)
    telemetry::init(&config.log_level);

    info!("Starting agent-scaler webhook dispatcher");
    info!(
        listen_addr = %config.listen_addr,
        orchestrator = ?config.orchestrator,
        scale_mode = %config.scale_mode,
        "Configuration loaded"
    );

    // The client is built once and shared by every invocation.
    let client = match config.orchestrator.connect() {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to initialize orchestration client");
            return Err(e);
        }
    };

    let dispatcher = Dispatcher::new(client).with_scale_mode(config.scale_mode);
    let app = api::create_router(AppState::new(dispatcher));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
            info!("Received shutdown signal");
        })
        .await?;

    info!("Webhook dispatcher shutdown complete");
    Ok(())
}
