//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the report API and its pages on their own.
//!
//! ## Intended use
//! Useful for development and debugging. The workspace's main `vitals-run` binary serves the
//! same application.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vitals_core::CoreConfig;

/// Main entry point for the vital-signs REST API server
///
/// # Environment Variables
/// - `VITALS_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - everything read by `CoreConfig::from_lookup` (dataset, generation service, renderer)
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid or the dataset cannot be loaded,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("vitals_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("VITALS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(CoreConfig::from_lookup(|name| std::env::var(name).ok())?);
    tracing::info!(
        "-- dataset {}, model {}, renderer {}",
        cfg.dataset_path().display(),
        cfg.generation().model,
        cfg.renderer().executable.display()
    );
    let state = api_rest::AppState::from_config(cfg)?;

    tracing::info!("-- Starting vitals REST API on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, api_rest::app(state)).await?;

    Ok(())
}
