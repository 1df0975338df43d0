use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::trade::TradeRecord;
use crate::services::trader_selector::ActiveTraderSet;

/// What an edge's weight measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightBasis {
    #[default]
    UsdVolume,
    TradeCount,
}

impl WeightBasis {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "usd_volume" | "volume" => Some(WeightBasis::UsdVolume),
            "trade_count" | "trades" => Some(WeightBasis::TradeCount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionPolicy {
    pub min_connection_strength: Decimal,
    pub weight_basis: WeightBasis,
}

/// Undirected, weighted interaction between two active traders.
///
/// `source < target` always holds, so a pair appears at most once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionEdge {
    pub source: String,
    pub target: String,
    pub weight: Decimal,
    pub usd_volume: Decimal,
    pub total_tokens_traded: Decimal,
    pub trade_count: u64,
}

#[derive(Default)]
struct PairTotals {
    usd_volume: Decimal,
    tokens: Decimal,
    trade_count: u64,
}

pub struct ConnectionGraphBuilder {
    policy: ConnectionPolicy,
}

impl ConnectionGraphBuilder {
    pub fn new(policy: ConnectionPolicy) -> Self {
        Self { policy }
    }

    /// Derive thresholded edges among the active set, ordered by (source, target)
    pub fn build_edges(&self, active: &ActiveTraderSet, records: &[TradeRecord]) -> Vec<ConnectionEdge> {
        let mut pairs: BTreeMap<(String, String), PairTotals> = BTreeMap::new();

        for record in records {
            let Some(ref counterparty) = record.counterparty_address else {
                continue;
            };
            let trader = &record.trader_address;

            if trader == counterparty || !active.contains(trader) || !active.contains(counterparty) {
                continue;
            }

            let key = if trader < counterparty {
                (trader.clone(), counterparty.clone())
            } else {
                (counterparty.clone(), trader.clone())
            };

            let totals = pairs.entry(key).or_default();
            totals.usd_volume = totals.usd_volume.saturating_add(record.usd_amount);
            if let Some(tokens) = record.token_amount {
                totals.tokens = totals.tokens.saturating_add(tokens);
            }
            totals.trade_count += 1;
        }

        let candidate_pairs = pairs.len();

        let edges: Vec<ConnectionEdge> = pairs
            .into_iter()
            .filter_map(|((source, target), totals)| {
                let weight = match self.policy.weight_basis {
                    WeightBasis::UsdVolume => totals.usd_volume,
                    WeightBasis::TradeCount => Decimal::from(totals.trade_count),
                };

                if weight < self.policy.min_connection_strength {
                    return None;
                }

                Some(ConnectionEdge {
                    source,
                    target,
                    weight,
                    usd_volume: totals.usd_volume,
                    total_tokens_traded: totals.tokens,
                    trade_count: totals.trade_count,
                })
            })
            .collect();

        tracing::debug!(
            "Kept {} of {} trader pairs (min_connection_strength={}, basis={:?})",
            edges.len(),
            candidate_pairs,
            self.policy.min_connection_strength,
            self.policy.weight_basis
        );

        edges
    }
}

/// Active traders as nodes plus the filtered edges between them.
///
/// Traders without any surviving edge remain in `nodes` as isolated nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct TraderGraph {
    pub nodes: ActiveTraderSet,
    pub edges: Vec<ConnectionEdge>,
}

impl TraderGraph {
    pub fn build(active: ActiveTraderSet, records: &[TradeRecord], policy: ConnectionPolicy) -> Self {
        let edges = ConnectionGraphBuilder::new(policy).build_edges(&active, records);
        Self { nodes: active, edges }
    }

    /// Node addresses that have no surviving edge
    pub fn isolated_nodes(&self) -> Vec<&str> {
        self.nodes
            .addresses()
            .into_iter()
            .filter(|addr| !self.edges.iter().any(|e| e.source == *addr || e.target == *addr))
            .collect()
    }
}
