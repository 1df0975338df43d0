//! Maps warehouse rows of either schema family into canonical [`TradeRecord`]s.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::MalformedRecord;
use crate::models::trade::{EvmTradeRow, RawTradeRow, SolanaTradeRow, TradeDirection, TradeRecord};
use crate::services::pipeline_config::QueryScope;

const EVM_ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";
const SOLANA_SYSTEM_PROGRAM: &str = "11111111111111111111111111111111";

/// No single trade is worth more than this; larger values are feed errors
const MAX_TRADE_USD: Decimal = dec!(1000000000000);

/// Row accounting for one normalization batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizationReport {
    pub rows_received: usize,
    pub rows_accepted: usize,
    pub dropped_rows: usize,
    pub drop_reasons: BTreeMap<MalformedRecord, usize>,
}

impl NormalizationReport {
    fn record_drop(&mut self, reason: MalformedRecord) {
        self.dropped_rows += 1;
        *self.drop_reasons.entry(reason).or_insert(0) += 1;
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedTrades {
    pub records: Vec<TradeRecord>,
    pub report: NormalizationReport,
}

pub struct TradeNormalizer<'a> {
    scope: &'a QueryScope,
}

impl<'a> TradeNormalizer<'a> {
    pub fn new(scope: &'a QueryScope) -> Self {
        Self { scope }
    }

    /// Normalize a batch, dropping and counting rows that cannot be used
    pub fn normalize(&self, rows: &[RawTradeRow]) -> NormalizedTrades {
        let mut report = NormalizationReport {
            rows_received: rows.len(),
            ..Default::default()
        };
        let mut records = Vec::with_capacity(rows.len());

        for (idx, row) in rows.iter().enumerate() {
            match self.normalize_row(row) {
                Ok(record) => records.push(record),
                Err(reason) => {
                    tracing::debug!("Dropping row {}: {}", idx, reason);
                    report.record_drop(reason);
                }
            }
        }

        report.rows_accepted = records.len();

        if report.dropped_rows > 0 {
            tracing::warn!(
                "Dropped {} of {} rows for {} on {}: {:?}",
                report.dropped_rows,
                report.rows_received,
                self.scope.token_address,
                self.scope.chain.as_str(),
                report.drop_reasons
            );
        }

        NormalizedTrades { records, report }
    }

    pub fn normalize_row(&self, row: &RawTradeRow) -> Result<TradeRecord, MalformedRecord> {
        match row {
            RawTradeRow::Evm(evm) => self.normalize_evm(evm),
            RawTradeRow::Solana(sol) => self.normalize_solana(sol),
            RawTradeRow::Undecodable(_) => Err(MalformedRecord::Undecodable),
        }
    }

    fn normalize_evm(&self, row: &EvmTradeRow) -> Result<TradeRecord, MalformedRecord> {
        let trader = clean_evm_address(row.from_address.as_deref()).ok_or(MalformedRecord::MissingTrader)?;

        if let Some(token) = clean_evm_address(row.token_address.as_deref()) {
            if token != self.scope.token_address {
                return Err(MalformedRecord::TokenMismatch);
            }
        }

        let usd_amount = parse_usd_amount(row.amount_usd.as_ref())?;
        let timestamp = self.parse_in_range(row.block_timestamp.as_deref())?;

        let counterparty = clean_evm_address(row.to_address.as_deref())
            .filter(|addr| addr != EVM_ZERO_ADDRESS && *addr != trader);

        let token_amount = parse_token_amount(row.amount.as_ref());

        let direction = row
            .direction
            .as_deref()
            .map(TradeDirection::from_str)
            .unwrap_or(TradeDirection::Unknown);

        Ok(self.record(trader, counterparty, usd_amount, token_amount, timestamp, direction))
    }

    fn normalize_solana(&self, row: &SolanaTradeRow) -> Result<TradeRecord, MalformedRecord> {
        let trader = clean_solana_address(row.swapper.as_deref()).ok_or(MalformedRecord::MissingTrader)?;
        let token = self.scope.token_address.as_str();

        let mint = clean_solana_address(row.mint.as_deref());
        let from_mint = clean_solana_address(row.swap_from_mint.as_deref());
        let to_mint = clean_solana_address(row.swap_to_mint.as_deref());

        if mint.as_deref().is_some_and(|m| m != token) {
            return Err(MalformedRecord::TokenMismatch);
        }
        if from_mint.is_some() && to_mint.is_some() && from_mint.as_deref() != Some(token) && to_mint.as_deref() != Some(token)
        {
            return Err(MalformedRecord::TokenMismatch);
        }

        let usd_amount = parse_usd_amount(row.amount_usd.as_ref())?;
        let timestamp = self.parse_in_range(row.block_timestamp.as_deref())?;

        let counterparty = clean_solana_address(row.counterparty.as_deref())
            .filter(|addr| addr != SOLANA_SYSTEM_PROGRAM && *addr != trader);

        let token_amount = parse_token_amount(row.amount.as_ref());

        let direction = if to_mint.as_deref() == Some(token) {
            TradeDirection::Buy
        } else if from_mint.as_deref() == Some(token) {
            TradeDirection::Sell
        } else {
            TradeDirection::Unknown
        };

        Ok(self.record(trader, counterparty, usd_amount, token_amount, timestamp, direction))
    }

    fn parse_in_range(&self, raw: Option<&str>) -> Result<DateTime<Utc>, MalformedRecord> {
        let timestamp = parse_timestamp(raw)?;
        if !self.scope.date_range.contains(&timestamp) {
            return Err(MalformedRecord::OutOfRange);
        }
        Ok(timestamp)
    }

    fn record(
        &self,
        trader: String,
        counterparty: Option<String>,
        usd_amount: Decimal,
        token_amount: Option<Decimal>,
        timestamp: DateTime<Utc>,
        direction: TradeDirection,
    ) -> TradeRecord {
        TradeRecord {
            trader_address: trader,
            counterparty_address: counterparty,
            token_address: self.scope.token_address.clone(),
            chain: self.scope.chain,
            usd_amount,
            token_amount,
            timestamp,
            direction,
        }
    }
}

fn clean_evm_address(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

fn clean_solana_address(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse a USD amount from a JSON number or numeric string such as `"1,234.50"`
fn parse_usd_amount(raw: Option<&Value>) -> Result<Decimal, MalformedRecord> {
    let amount = parse_decimal(raw)?;

    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MalformedRecord::NegativeAmount);
    }
    if amount > MAX_TRADE_USD {
        return Err(MalformedRecord::ImplausibleAmount);
    }

    Ok(amount.normalize())
}

/// Token units are informational: unusable values become `None`, sign is dropped
fn parse_token_amount(raw: Option<&Value>) -> Option<Decimal> {
    parse_decimal(raw).ok().map(|amount| amount.abs().normalize())
}

fn parse_decimal(raw: Option<&Value>) -> Result<Decimal, MalformedRecord> {
    let text = match raw {
        None | Some(Value::Null) => return Err(MalformedRecord::MissingAmount),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().replace(',', ""),
        Some(_) => return Err(MalformedRecord::NonNumericAmount),
    };

    if text.is_empty() {
        return Err(MalformedRecord::MissingAmount);
    }

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| MalformedRecord::NonNumericAmount)
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` (UTC) or a bare date
fn parse_timestamp(raw: Option<&str>) -> Result<DateTime<Utc>, MalformedRecord> {
    let text = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or(MalformedRecord::InvalidTimestamp)?;

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        .map_err(|_| MalformedRecord::InvalidTimestamp)
}
