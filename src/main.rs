use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use summary_core::config::env;
use summary_core::constants::DEFAULT_LISTEN_ADDR;
use summary_core::{AggregationPipeline, ClientConfig, ConfigValues};

/// Main entry point for the SMART summary application
///
/// Resolves the client configuration once, then serves the browser-facing routes until
/// interrupted.
///
/// # Environment Variables
/// - `SMART_LISTEN_ADDR`: server address (default: "0.0.0.0:8000")
/// - `SMART_AUTH_BASE`, `SMART_FHIR_BASE`: authorization server and FHIR base URLs
/// - `SMART_CLIENT_ID`, `SMART_REDIRECT_URI`, `SMART_SCOPES`: registered client details
/// - `SMART_REQUEST_TIMEOUT_SECS`, `SMART_FETCH_RETRIES`: outbound request limits
///
/// # Errors
/// Returns an error if the configuration is invalid, the address cannot be bound, or the
/// server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("smart_summary_run=info".parse()?)
                .add_directive("summary_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var(env::LISTEN_ADDR).unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.into());
    let config = Arc::new(ClientConfig::resolve(ConfigValues::from_env())?);

    tracing::info!("++ Starting SMART summary app on {}", addr);
    tracing::info!("++ Authorization server: {}", config.auth_base());
    tracing::info!("++ FHIR server: {}", config.fhir_base());

    let pipeline = AggregationPipeline::new(config)?;
    let app = api_rest::router(AppState::new(pipeline));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("-- Shutting down");
}
