//! giftwise HTTP server binary.
//!
//! # Environment Variables
//!
//! - `PORT` — HTTP port (default: 8080)
//! - `OPENROUTER_API_KEY` — provider API key
//! - `GIFTWISE_CONFIG` — optional YAML config file
//! - `RUST_LOG` — Tracing filter (default: "info,giftwise=debug")
//!
//! See [`giftwise::config`] for the full list.
//!
//! # Usage
//!
//! ```bash
//! OPENROUTER_API_KEY=sk-or-... cargo run --bin server
//! ```

use anyhow::Context;
use giftwise::config::AppConfig;
use giftwise::server::{app_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,giftwise=debug".into()),
        )
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::debug!(?config, "Configuration loaded");
    if config.api_key.is_none() {
        tracing::warn!("OPENROUTER_API_KEY is not set; AI requests will be rejected");
    }

    let state = AppState::from_config(&config).context("failed to build OpenRouter client")?;
    let app = app_router(state);

    let bind_addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("giftwise server starting on {}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health            — liveness probe");
    tracing::info!("  POST /api/ai/openrouter — AI actions");
    tracing::info!("  GET  /api/ai/openrouter — model list");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;

    tracing::info!("giftwise server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
