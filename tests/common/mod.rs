use async_trait::async_trait;
use axum::Router;
use bubblemap_backend::{
    app,
    error::UpstreamError,
    models::trade::{EvmTradeRow, RawTradeRow},
    services::{pipeline_config::QueryScope, trade_source::TradeSource},
    AppState,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

pub const TOKEN: &str = "0x6982508145454ce325ddbe47a25d4ec3d2311933";

/// Serves a fixed batch of rows and remembers the scopes it was asked for
pub struct StaticTradeSource {
    rows: Vec<RawTradeRow>,
    pub requested: Mutex<Vec<QueryScope>>,
}

impl StaticTradeSource {
    pub fn new(rows: Vec<RawTradeRow>) -> Self {
        Self {
            rows,
            requested: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TradeSource for StaticTradeSource {
    async fn fetch_trades(&self, scope: &QueryScope) -> Result<Vec<RawTradeRow>, UpstreamError> {
        self.requested.lock().unwrap().push(scope.clone());
        Ok(self.rows.clone())
    }

    fn source_name(&self) -> &str {
        "static"
    }
}

/// Always fails as if the warehouse were down
pub struct FailingTradeSource;

#[async_trait]
impl TradeSource for FailingTradeSource {
    async fn fetch_trades(&self, _scope: &QueryScope) -> Result<Vec<RawTradeRow>, UpstreamError> {
        Err(UpstreamError::Timeout(std::time::Duration::from_secs(300)))
    }

    fn source_name(&self) -> &str {
        "failing"
    }
}

pub fn build_test_router(source: Arc<dyn TradeSource>) -> Router {
    app(AppState { trade_source: source })
}

pub fn evm_row(from: &str, to: &str, usd: f64, ts: &str) -> RawTradeRow {
    RawTradeRow::Evm(EvmTradeRow {
        from_address: Some(from.to_string()),
        to_address: Some(to.to_string()),
        token_address: Some(TOKEN.to_string()),
        amount_usd: Some(json!(usd)),
        block_timestamp: Some(ts.to_string()),
        ..Default::default()
    })
}

/// A -> B $100, B -> A $50, A -> C $10, spread over three days
pub fn scenario_rows() -> Vec<RawTradeRow> {
    vec![
        evm_row("0xaaa", "0xbbb", 100.0, "2024-03-01 10:00:00.000"),
        evm_row("0xbbb", "0xaaa", 50.0, "2024-03-02 10:00:00.000"),
        evm_row("0xaaa", "0xccc", 10.0, "2024-03-03 10:00:00.000"),
    ]
}
