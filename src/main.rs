use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bubblemap_backend::{app, config::AppConfig, services::flipside::FlipsideService, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bubblemap_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    tracing::info!(
        "Using Flipside at {} (poll every {:?}, give up after {:?})",
        config.flipside.base_url,
        config.flipside.poll_interval,
        config.flipside.max_wait
    );

    let flipside = FlipsideService::new(&config.flipside).context("Failed to build Flipside client")?;
    let state = AppState {
        trade_source: Arc::new(flipside),
    };

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
