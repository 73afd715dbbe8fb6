//! fund-backtest HTTP Server
//!
//! Axum-based server exposing the backtest engine as a JSON API, plus
//! endpoints that fetch historical net values from the configured provider.

mod config;
mod handlers;
mod state;

use std::path::Path;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::handlers::{
    fund_batch, fund_data, health_check, run_backtest, run_multi_backtest,
};
use crate::state::AppState;

/// Routes, layers and state
fn app(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))

        // Price data
        .route("/api/fund/{code}", get(fund_data))
        .route("/api/funds", post(fund_batch))

        // Backtests
        .route("/api/backtest", post(run_backtest))
        .route("/api/backtest/multi", post(run_multi_backtest))

        // Static files (chart frontend)
        .fallback_service(ServeDir::new(static_dir))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let provider = config.build_provider()?;

    if provider.health_check().await {
        tracing::info!("✓ Price provider '{}' available", provider.name());
    } else {
        tracing::warn!("⚠ Price provider '{}' not available - fund data requests will fail", provider.name());
        tracing::warn!("  Set FUND_DATA_SCRIPT or FUND_PROVIDER_URL in .env");
    }

    let state = AppState {
        provider,
        request_timeout: config.request_timeout,
    };

    let app = app(state, &config.static_dir);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 fund-backtest server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health              - Health check");
    tracing::info!("  GET  /api/fund/{{code}}     - Fund net value history");
    tracing::info!("  POST /api/funds           - Several funds at once");
    tracing::info!("  POST /api/backtest        - Single-fund DCA backtest");
    tracing::info!("  POST /api/backtest/multi  - Multi-fund comparison");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
