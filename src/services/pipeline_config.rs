use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BubblemapError;
use crate::models::trade::{Chain, ChainFamily};
use crate::services::connection_graph::{ConnectionPolicy, WeightBasis};
use crate::services::trader_selector::{RankingMetric, SelectionPolicy};

/// Inclusive range of whole UTC days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, BubblemapError> {
        if start > end {
            return Err(BubblemapError::invalid(
                "start_date",
                format!("start date {} is after end date {}", start, end),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn start_instant(&self) -> DateTime<Utc> {
        self.start.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// First instant after the range (midnight following `end`)
    pub fn end_exclusive(&self) -> DateTime<Utc> {
        let next_day = self.end.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX);
        next_day.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        *ts >= self.start_instant() && *ts < self.end_exclusive()
    }
}

/// Token, chain and window a single query is scoped to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryScope {
    pub token_address: String,
    pub chain: Chain,
    pub date_range: DateRange,
}

impl QueryScope {
    pub fn new(token_address: &str, chain: Chain, date_range: DateRange) -> Result<Self, BubblemapError> {
        let trimmed = token_address.trim();
        if trimmed.is_empty() {
            return Err(BubblemapError::invalid("token_address", "token address is empty"));
        }

        // EVM addresses are hex and compared case-insensitively; base58 is case-sensitive
        let token_address = match chain.family() {
            ChainFamily::Evm => trimmed.to_lowercase(),
            ChainFamily::Solana => trimmed.to_string(),
        };

        Ok(Self {
            token_address,
            chain,
            date_range,
        })
    }
}

/// Unvalidated pipeline configuration as supplied by a caller.
///
/// Counts are signed so that negative input can be reported as a configuration
/// error instead of failing to deserialize.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub token_address: String,
    pub chain: Chain,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub min_volume: Decimal,
    pub max_volume: Option<Decimal>,
    pub min_trades: i64,
    pub min_active_days: i64,
    pub max_traders: i64,
    pub min_connection_strength: Decimal,
    pub weight_basis: WeightBasis,
    pub rank_by: RankingMetric,
}

impl PipelineConfig {
    /// Config with neutral thresholds: everything selected, no edge pruning
    pub fn new(token_address: &str, chain: Chain, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            token_address: token_address.to_string(),
            chain,
            start_date,
            end_date,
            min_volume: Decimal::ZERO,
            max_volume: None,
            min_trades: 0,
            min_active_days: 0,
            max_traders: 200,
            min_connection_strength: Decimal::ZERO,
            weight_basis: WeightBasis::UsdVolume,
            rank_by: RankingMetric::UsdVolume,
        }
    }

    /// Check every threshold and split into per-stage settings
    pub fn validate(&self) -> Result<ValidatedConfig, BubblemapError> {
        if self.min_volume < Decimal::ZERO {
            return Err(BubblemapError::invalid("min_volume", "must not be negative"));
        }
        if let Some(max_volume) = self.max_volume {
            if max_volume < self.min_volume {
                return Err(BubblemapError::invalid(
                    "max_volume",
                    format!("{} is below min_volume {}", max_volume, self.min_volume),
                ));
            }
        }
        if self.min_trades < 0 {
            return Err(BubblemapError::invalid("min_trades", "must not be negative"));
        }
        if self.min_active_days < 0 {
            return Err(BubblemapError::invalid("min_active_days", "must not be negative"));
        }
        if self.max_traders <= 0 {
            return Err(BubblemapError::invalid("max_traders", "must be greater than zero"));
        }
        if self.min_connection_strength < Decimal::ZERO {
            return Err(BubblemapError::invalid(
                "min_connection_strength",
                "must not be negative",
            ));
        }

        let date_range = DateRange::new(self.start_date, self.end_date)?;
        let scope = QueryScope::new(&self.token_address, self.chain, date_range)?;

        let min_active_days = u32::try_from(self.min_active_days)
            .map_err(|_| BubblemapError::invalid("min_active_days", "value too large"))?;
        let max_traders = usize::try_from(self.max_traders)
            .map_err(|_| BubblemapError::invalid("max_traders", "value too large"))?;

        Ok(ValidatedConfig {
            scope,
            selection: SelectionPolicy {
                min_volume: self.min_volume,
                max_volume: self.max_volume,
                min_trades: self.min_trades as u64,
                min_active_days,
                max_traders,
                rank_by: self.rank_by,
            },
            connections: ConnectionPolicy {
                min_connection_strength: self.min_connection_strength,
                weight_basis: self.weight_basis,
            },
        })
    }
}

/// Configuration that passed validation, split per pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub scope: QueryScope,
    pub selection: SelectionPolicy,
    pub connections: ConnectionPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn base_config() -> PipelineConfig {
        PipelineConfig::new("0xABCdef", Chain::Ethereum, date("2024-03-01"), date("2024-03-07"))
    }

    #[test]
    fn test_date_range_is_inclusive_of_end_day() {
        let range = DateRange::new(date("2024-03-01"), date("2024-03-01")).unwrap();
        let late = date("2024-03-01").and_hms_opt(23, 59, 59).unwrap().and_utc();
        let next = date("2024-03-02").and_hms_opt(0, 0, 0).unwrap().and_utc();

        assert!(range.contains(&range.start_instant()));
        assert!(range.contains(&late));
        assert!(!range.contains(&next));
    }

    #[test]
    fn test_reversed_dates_rejected() {
        let err = DateRange::new(date("2024-03-02"), date("2024-03-01")).unwrap_err();
        assert_eq!(err.field(), Some("start_date"));
    }

    #[test]
    fn test_evm_token_lowercased() {
        let validated = base_config().validate().unwrap();
        assert_eq!(validated.scope.token_address, "0xabcdef");
    }

    #[test]
    fn test_solana_token_case_preserved() {
        let mut config = base_config();
        config.chain = Chain::Solana;
        config.token_address = " So1AbC ".to_string();

        let validated = config.validate().unwrap();
        assert_eq!(validated.scope.token_address, "So1AbC");
    }

    #[test]
    fn test_max_traders_zero_or_negative_rejected() {
        for value in [0, -5] {
            let mut config = base_config();
            config.max_traders = value;
            let err = config.validate().unwrap_err();
            assert_eq!(err.field(), Some("max_traders"));
        }
    }

    #[test]
    fn test_negative_thresholds_rejected() {
        let mut config = base_config();
        config.min_volume = dec!(-1);
        assert_eq!(config.validate().unwrap_err().field(), Some("min_volume"));

        let mut config = base_config();
        config.min_trades = -1;
        assert_eq!(config.validate().unwrap_err().field(), Some("min_trades"));

        let mut config = base_config();
        config.min_connection_strength = dec!(-0.01);
        assert_eq!(
            config.validate().unwrap_err().field(),
            Some("min_connection_strength")
        );
    }

    #[test]
    fn test_max_volume_below_min_rejected() {
        let mut config = base_config();
        config.min_volume = dec!(100);
        config.max_volume = Some(dec!(50));
        assert_eq!(config.validate().unwrap_err().field(), Some("max_volume"));
    }

    #[test]
    fn test_empty_token_rejected() {
        let mut config = base_config();
        config.token_address = "   ".to_string();
        assert_eq!(config.validate().unwrap_err().field(), Some("token_address"));
    }

    #[test]
    fn test_validated_policies() {
        let mut config = base_config();
        config.min_trades = 5;
        config.max_traders = 50;
        config.min_connection_strength = dec!(25);
        config.weight_basis = WeightBasis::TradeCount;

        let validated = config.validate().unwrap();
        assert_eq!(validated.selection.min_trades, 5);
        assert_eq!(validated.selection.max_traders, 50);
        assert_eq!(validated.connections.min_connection_strength, dec!(25));
        assert_eq!(validated.connections.weight_basis, WeightBasis::TradeCount);
    }
}
