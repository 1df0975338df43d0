use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::trade::TradeRecord;

/// Per-address trading metrics within one chain+token scope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraderAggregate {
    pub address: String,
    pub total_usd_volume: Decimal,
    pub total_tokens_traded: Decimal,
    pub trade_count: u64,
    pub counterparties: BTreeSet<String>,
    pub active_days: u32,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Mutable accumulator, frozen into a [`TraderAggregate`] once the batch is consumed
#[derive(Default)]
struct TraderAccumulator {
    total_usd_volume: Decimal,
    total_tokens_traded: Decimal,
    trade_count: u64,
    counterparties: BTreeSet<String>,
    active_dates: BTreeSet<NaiveDate>,
    first_seen: Option<DateTime<Utc>>,
    last_seen: Option<DateTime<Utc>>,
}

impl TraderAccumulator {
    // Sums saturate at Decimal::MAX instead of panicking
    fn add_trade(&mut self, record: &TradeRecord) {
        self.total_usd_volume = self.total_usd_volume.saturating_add(record.usd_amount);
        if let Some(tokens) = record.token_amount {
            self.total_tokens_traded = self.total_tokens_traded.saturating_add(tokens);
        }
        self.trade_count += 1;
        self.active_dates.insert(record.timestamp.date_naive());

        if let Some(ref counterparty) = record.counterparty_address {
            self.counterparties.insert(counterparty.clone());
        }

        self.first_seen = Some(match self.first_seen {
            Some(seen) => seen.min(record.timestamp),
            None => record.timestamp,
        });
        self.last_seen = Some(match self.last_seen {
            Some(seen) => seen.max(record.timestamp),
            None => record.timestamp,
        });
    }

    fn finish(self, address: String) -> TraderAggregate {
        TraderAggregate {
            address,
            total_usd_volume: self.total_usd_volume,
            total_tokens_traded: self.total_tokens_traded,
            trade_count: self.trade_count,
            counterparties: self.counterparties,
            active_days: self.active_dates.len() as u32,
            first_seen: self.first_seen,
            last_seen: self.last_seen,
        }
    }
}

/// Aggregate a batch of normalized trades by address in a single pass.
///
/// Counterparties are registered as keys too, so an address that only ever
/// shows up on the other side of a trade still gets a (zero volume) entry.
/// Volume and counts are attributed to the trader of record only.
pub fn aggregate_traders(records: &[TradeRecord]) -> BTreeMap<String, TraderAggregate> {
    let mut accumulators: BTreeMap<String, TraderAccumulator> = BTreeMap::new();

    for record in records {
        accumulators
            .entry(record.trader_address.clone())
            .or_default()
            .add_trade(record);

        if let Some(ref counterparty) = record.counterparty_address {
            accumulators.entry(counterparty.clone()).or_default();
        }
    }

    let aggregates: BTreeMap<String, TraderAggregate> = accumulators
        .into_iter()
        .map(|(address, acc)| (address.clone(), acc.finish(address)))
        .collect();

    tracing::debug!(
        "Aggregated {} records into {} addresses",
        records.len(),
        aggregates.len()
    );

    aggregates
}
