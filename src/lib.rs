// src/lib.rs

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use services::trade_source::TradeSource;

#[derive(Clone)]
pub struct AppState {
    pub trade_source: Arc<dyn TradeSource>,
}

pub mod config;
pub mod error;

pub mod models {
    pub mod bubblemap;
    pub mod trade;
}

pub mod services {
    pub mod trade_source;
    pub mod flipside;
    pub mod pipeline_config;
    pub mod trade_normalizer;
    pub mod trader_aggregator;
    pub mod trader_selector;
    pub mod connection_graph;
    pub mod graph_export;
    pub mod pipeline;
}

pub mod handlers {
    pub mod bubblemap;
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(hello_bubblemap))
        .route("/api/chains", get(handlers::bubblemap::list_chains))
        .route("/api/bubblemap", post(handlers::bubblemap::create_bubblemap))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn hello_bubblemap() -> &'static str {
    "Hello from Bubblemap Backend! 🫧"
}
