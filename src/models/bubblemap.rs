use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::BubblemapError;
use crate::models::trade::{Chain, ChainFamily};
use crate::services::connection_graph::WeightBasis;
use crate::services::pipeline_config::PipelineConfig;
use crate::services::trader_selector::RankingMetric;

/// Request body for POST /api/bubblemap
///
/// Chain, dates and enum-valued fields stay strings here so a bad value is
/// reported as a 400 naming the field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BubblemapRequest {
    pub token_address: String,
    pub chain: String,
    pub start_date: String,           // YYYY-MM-DD
    pub end_date: String,             // YYYY-MM-DD, inclusive
    #[serde(default = "default_min_volume")]
    pub min_volume: Decimal,
    #[serde(default, deserialize_with = "explicit_value", skip_serializing_if = "Option::is_none")]
    pub max_volume: Option<Option<Decimal>>, // absent: default cap, null: no cap
    #[serde(default)]
    pub min_trades: i64,
    #[serde(default = "default_min_active_days")]
    pub min_active_days: i64,
    #[serde(default = "default_max_traders")]
    pub max_traders: i64,
    #[serde(default)]
    pub min_connection_strength: Decimal,
    #[serde(default)]
    pub weight_basis: Option<String>, // "usd_volume" | "trade_count"
    #[serde(default)]
    pub rank_by: Option<String>,      // "usd_volume" | "trade_count"
}

fn default_min_volume() -> Decimal {
    dec!(1)
}

const DEFAULT_MAX_VOLUME: Decimal = dec!(10000000);

/// Distinguishes an explicit `null` from an absent field
fn explicit_value<'de, D>(deserializer: D) -> Result<Option<Option<Decimal>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Decimal>::deserialize(deserializer).map(Some)
}

fn default_min_active_days() -> i64 {
    3
}

fn default_max_traders() -> i64 {
    200
}

impl BubblemapRequest {
    /// Resolve into a pipeline configuration. `today` bounds the end date.
    pub fn into_config(self, today: NaiveDate) -> Result<PipelineConfig, BubblemapError> {
        let chain = Chain::from_str(&self.chain)
            .ok_or_else(|| BubblemapError::invalid("chain", format!("unsupported chain `{}`", self.chain)))?;

        let start_date = parse_date("start_date", &self.start_date)?;
        let end_date = parse_date("end_date", &self.end_date)?;
        if end_date > today {
            return Err(BubblemapError::invalid(
                "end_date",
                format!("end date {} is in the future", end_date),
            ));
        }

        let weight_basis = match self.weight_basis.as_deref() {
            None => WeightBasis::default(),
            Some(raw) => WeightBasis::from_str(raw)
                .ok_or_else(|| BubblemapError::invalid("weight_basis", format!("unknown weight basis `{}`", raw)))?,
        };
        let rank_by = match self.rank_by.as_deref() {
            None => RankingMetric::default(),
            Some(raw) => RankingMetric::from_str(raw)
                .ok_or_else(|| BubblemapError::invalid("rank_by", format!("unknown ranking metric `{}`", raw)))?,
        };

        // The default cap only applies when it leaves the volume window non-empty
        let max_volume = match self.max_volume {
            Some(explicit) => explicit,
            None if self.min_volume <= DEFAULT_MAX_VOLUME => Some(DEFAULT_MAX_VOLUME),
            None => None,
        };

        Ok(PipelineConfig {
            token_address: self.token_address,
            chain,
            start_date,
            end_date,
            min_volume: self.min_volume,
            max_volume,
            min_trades: self.min_trades,
            min_active_days: self.min_active_days,
            max_traders: self.max_traders,
            min_connection_strength: self.min_connection_strength,
            weight_basis,
            rank_by,
        })
    }
}

fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate, BubblemapError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| BubblemapError::invalid(field, format!("`{}` is not a YYYY-MM-DD date", raw)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainInfo {
    pub chain: Chain,
    pub family: ChainFamily,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainsResponse {
    pub chains: Vec<ChainInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}
