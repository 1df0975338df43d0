//! Converts a [`TraderGraph`] into plain serializable data for a renderer.
//!
//! Nothing here knows about a particular drawing library. Display hints
//! (label, size, color) are derived purely from node volumes so any
//! front end can use or ignore them.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::services::connection_graph::TraderGraph;
use crate::services::trader_selector::ActiveTraderSet;

const MIN_NODE_SIZE: f64 = 10.0;
const MAX_NODE_SIZE: f64 = 50.0;
const LARGE_TRADER_COLOR: &str = "#FF4500";
const SMALL_TRADER_COLOR: &str = "#1E90FF";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub attributes: NodeAttributes,
    pub display: NodeDisplay,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeAttributes {
    pub rank: usize,
    pub total_usd_volume: Decimal,
    pub total_tokens_traded: Decimal,
    pub trade_count: u64,
    pub active_days: u32,
    pub counterparty_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDisplay {
    pub label: String,
    pub title: String,
    pub size: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub weight: Decimal,
    pub usd_volume: Decimal,
    pub total_tokens_traded: Decimal,
    pub trade_count: u64,
}

/// One row of the ranked top-trader table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTraderRow {
    pub rank: usize,
    pub address: String,
    pub total_usd_volume: Decimal,
    pub trade_count: u64,
}

pub fn export_graph(graph: &TraderGraph) -> ExportedGraph {
    let members = graph.nodes.members();
    let volumes: Vec<Decimal> = members.iter().map(|m| m.total_usd_volume).collect();
    let scale = VolumeScale::from_volumes(&volumes);

    let nodes = members
        .iter()
        .enumerate()
        .map(|(idx, member)| GraphNode {
            id: member.address.clone(),
            attributes: NodeAttributes {
                rank: idx + 1,
                total_usd_volume: member.total_usd_volume,
                total_tokens_traded: member.total_tokens_traded,
                trade_count: member.trade_count,
                active_days: member.active_days,
                counterparty_count: member.counterparties.len(),
            },
            display: NodeDisplay {
                label: short_label(&member.address),
                title: format!(
                    "{}\nVolume: ${}",
                    member.address,
                    format_usd(member.total_usd_volume)
                ),
                size: scale.size_for(member.total_usd_volume),
                color: scale.color_for(member.total_usd_volume).to_string(),
            },
        })
        .collect();

    let edges = graph
        .edges
        .iter()
        .map(|edge| GraphEdge {
            source: edge.source.clone(),
            target: edge.target.clone(),
            weight: edge.weight,
            usd_volume: edge.usd_volume,
            total_tokens_traded: edge.total_tokens_traded,
            trade_count: edge.trade_count,
        })
        .collect();

    ExportedGraph { nodes, edges }
}

pub fn ranking_table(active: &ActiveTraderSet) -> Vec<RankedTraderRow> {
    active
        .members()
        .iter()
        .enumerate()
        .map(|(idx, member)| RankedTraderRow {
            rank: idx + 1,
            address: member.address.clone(),
            total_usd_volume: member.total_usd_volume,
            trade_count: member.trade_count,
        })
        .collect()
}

struct VolumeScale {
    min: Decimal,
    range: Decimal,
    median: Decimal,
}

impl VolumeScale {
    fn from_volumes(volumes: &[Decimal]) -> Self {
        if volumes.is_empty() {
            return Self {
                min: Decimal::ZERO,
                range: Decimal::ONE,
                median: Decimal::ZERO,
            };
        }

        let mut sorted = volumes.to_vec();
        sorted.sort();

        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let range = if max == min { Decimal::ONE } else { max - min };

        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] / Decimal::from(2)).saturating_add(sorted[mid] / Decimal::from(2))
        } else {
            sorted[mid]
        };

        Self { min, range, median }
    }

    /// Linear size in [MIN_NODE_SIZE, MAX_NODE_SIZE]
    fn size_for(&self, volume: Decimal) -> f64 {
        let fraction = ((volume - self.min) / self.range).to_f64().unwrap_or(0.0);
        let size = MIN_NODE_SIZE + (MAX_NODE_SIZE - MIN_NODE_SIZE) * fraction;
        (size * 100.0).round() / 100.0
    }

    fn color_for(&self, volume: Decimal) -> &'static str {
        if volume >= self.median {
            LARGE_TRADER_COLOR
        } else {
            SMALL_TRADER_COLOR
        }
    }
}

/// `0x1234...abcd` style label; short addresses are kept whole
fn short_label(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Two decimals with thousands separators, e.g. `1,234,567.80`
fn format_usd(amount: Decimal) -> String {
    let rounded = format!(
        "{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    );
    let (int_part, frac_part) = rounded.split_once('.').unwrap_or((rounded.as_str(), "00"));
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}{}.{}", sign, grouped, frac_part)
}
