use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vitals_core::CoreConfig;

/// Main entry point for the vital-signs report application
///
/// Serves the JSON API under `/api`, the browser pages at `/` and the OpenAPI documentation at
/// `/swagger-ui`.
///
/// # Environment Variables
/// - `VITALS_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `VITALS_DATASET_PATH`: CSV dataset (default: "human_vital_signs_dataset_2024.csv")
/// - `VITALS_PAGE_SIZE`: Patients per page (default: 20)
/// - `GROQ_API_KEY`: Generation service key (required)
/// - `GROQ_BASE_URL`, `GROQ_MODEL`, `GENERATION_TIMEOUT_SECS`, `GENERATION_MAX_ATTEMPTS`
/// - `WKHTMLTOPDF_PATH`, `RENDER_TIMEOUT_SECS`
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, dataset loading or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vitals=info".parse()?)
                .add_directive("vitals_core=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("VITALS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(CoreConfig::from_lookup(|name| std::env::var(name).ok())?);
    tracing::info!(
        "++ dataset {}, page size {}, model {}",
        cfg.dataset_path().display(),
        cfg.page_size(),
        cfg.generation().model
    );
    let state = api_rest::AppState::from_config(cfg)?;

    tracing::info!("++ Starting vitals REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, api_rest::app(state)).await?;

    Ok(())
}
