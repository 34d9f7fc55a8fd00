//! well-scenario HTTP server binary.
//!
//! Loads `.env`, reads [`Settings`] from the environment, loads the metric
//! catalog once and serves the pipeline over HTTP.
//!
//! # Environment Variables
//!
//! - `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `OPENAI_TIMEOUT` - generative service access
//! - `SCENARIO_MODEL_NAME`, `ANNOTATION_MODEL_NAME`, `OPENAI_MODEL_NAME` - models
//! - `EXTRA_JSON_PATH`, `PROFILES_DIR`, `OUTPUTS_DIR` - data locations
//! - `SANITIZE_MODE` - sanitize persona instructions (default: true)
//! - `HOST`, `PORT` - bind address (default: 0.0.0.0:5000)
//! - `RUST_LOG` - tracing filter (default: "info,well_scenario=debug")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! ```

use anyhow::Context;
use well_scenario::server::{app_router, AppState};
use well_scenario::utilities::config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Ignoring unreadable .env file: {}", e);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,well_scenario=debug".into()),
        )
        .init();

    let settings = Settings::from_env();
    if settings.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; generation requests will fail");
    }

    let state = AppState::from_settings(&settings).context("Failed to initialize the pipeline")?;
    let app = app_router(state);
    let bind_addr = settings.bind_addr();

    tracing::info!("well-scenario server starting on {}", bind_addr);
    tracing::info!("Scenario model: {}", settings.scenario_model);
    tracing::info!("Annotation model: {}", settings.annotation_model);
    tracing::info!(
        "Sanitize mode: {}",
        if settings.sanitize_mode { "enabled" } else { "disabled" }
    );

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}
