//! HTTP server for the insight query pipeline
//!
//! Usage:
//!   GEMINI_API_KEY=... cargo run --features server --bin insight_server

use anyhow::{Context, Result};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use insight_agent::ai::GeminiClient;
use insight_agent::api::routes::{create_router, AppState};
use insight_agent::{AppConfig, DataContext, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("Invalid configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let data = DataContext::load_dir(&config.data_dir)
        .with_context(|| format!("Failed to load data from {}", config.data_dir.display()))?;
    let oracle = GeminiClient::new(config.ai.clone()).context("Failed to create Gemini client")?;
    let orchestrator = Orchestrator::new(&data, Arc::new(oracle), config.pipeline());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(Arc::new(orchestrator))).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    tracing::info!(
        addr = %config.bind_addr,
        model = %config.ai.model,
        confirmation_mode = ?config.confirmation_mode,
        "insight_server listening"
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
