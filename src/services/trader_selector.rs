use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use crate::services::trader_aggregator::TraderAggregate;

/// Primary metric the active trader set is ranked by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMetric {
    #[default]
    UsdVolume,
    TradeCount,
}

impl RankingMetric {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "usd_volume" | "volume" => Some(RankingMetric::UsdVolume),
            "trade_count" | "trades" => Some(RankingMetric::TradeCount),
            _ => None,
        }
    }
}

/// Thresholds a trader must pass to enter the active set
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPolicy {
    pub min_volume: Decimal,
    pub max_volume: Option<Decimal>, // Excludes whales, pools and bots when set
    pub min_trades: u64,
    pub min_active_days: u32,
    pub max_traders: usize,
    pub rank_by: RankingMetric,
}

impl SelectionPolicy {
    fn admits(&self, aggregate: &TraderAggregate) -> bool {
        aggregate.total_usd_volume >= self.min_volume
            && self
                .max_volume
                .map(|max| aggregate.total_usd_volume <= max)
                .unwrap_or(true)
            && aggregate.trade_count >= self.min_trades
            && aggregate.active_days >= self.min_active_days
    }
}

/// Ranked, thresholded set of traders. May be empty; callers treat that as a
/// normal "no traders matched" outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTraderSet {
    members: Vec<TraderAggregate>,
    addresses: HashSet<String>,
}

impl ActiveTraderSet {
    fn from_ranked(members: Vec<TraderAggregate>) -> Self {
        let addresses = members.iter().map(|m| m.address.clone()).collect();
        Self { members, addresses }
    }

    /// Members in rank order, best first
    pub fn members(&self) -> &[TraderAggregate] {
        &self.members
    }

    pub fn addresses(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.address.as_str()).collect()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

pub struct TopTraderSelector {
    policy: SelectionPolicy,
}

impl TopTraderSelector {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self { policy }
    }

    /// Filter by the policy minimums, rank deterministically and keep the top `max_traders`
    pub fn select(&self, aggregates: &BTreeMap<String, TraderAggregate>) -> ActiveTraderSet {
        let mut eligible: Vec<TraderAggregate> = aggregates
            .values()
            .filter(|agg| self.policy.admits(agg))
            .cloned()
            .collect();

        let eligible_count = eligible.len();

        eligible.sort_by(|a, b| rank_order(a, b, self.policy.rank_by));
        eligible.truncate(self.policy.max_traders);

        if eligible.is_empty() {
            tracing::warn!(
                "No traders matched selection thresholds ({} candidates, min_volume={}, min_trades={}, min_active_days={})",
                aggregates.len(),
                self.policy.min_volume,
                self.policy.min_trades,
                self.policy.min_active_days
            );
        } else {
            tracing::info!(
                "Selected {} of {} eligible traders ({} candidates)",
                eligible.len(),
                eligible_count,
                aggregates.len()
            );
        }

        ActiveTraderSet::from_ranked(eligible)
    }
}

/// Total order: primary metric desc, the other metric desc, address asc
fn rank_order(a: &TraderAggregate, b: &TraderAggregate, metric: RankingMetric) -> Ordering {
    let by_metric = match metric {
        RankingMetric::UsdVolume => b
            .total_usd_volume
            .cmp(&a.total_usd_volume)
            .then(b.trade_count.cmp(&a.trade_count)),
        RankingMetric::TradeCount => b
            .trade_count
            .cmp(&a.trade_count)
            .then(b.total_usd_volume.cmp(&a.total_usd_volume)),
    };

    by_metric.then_with(|| a.address.cmp(&b.address))
}
