//! End-to-end bubblemap pipeline.
//!
//! `validate -> normalize -> aggregate -> select -> connect -> export`, each
//! stage a pure function of the previous one. The only I/O happens in
//! [`build_bubblemap`], which asks a [`TradeSource`] for rows after the
//! configuration has been validated.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{BubblemapError, MalformedRecord};
use crate::models::trade::RawTradeRow;
use crate::services::connection_graph::TraderGraph;
use crate::services::graph_export::{export_graph, ranking_table, ExportedGraph, RankedTraderRow};
use crate::services::pipeline_config::{PipelineConfig, ValidatedConfig};
use crate::services::trade_normalizer::TradeNormalizer;
use crate::services::trade_source::TradeSource;
use crate::services::trader_aggregator::aggregate_traders;
use crate::services::trader_selector::TopTraderSelector;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub rows_received: usize,
    pub rows_accepted: usize,
    pub dropped_rows: usize,
    pub drop_reasons: BTreeMap<MalformedRecord, usize>,
    pub traders_aggregated: usize,
    pub traders_selected: usize,
    pub connections: usize,
    pub isolated_traders: usize,
    /// No trader passed the thresholds; graph and ranking are empty
    pub empty_result: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutcome {
    pub graph: ExportedGraph,
    pub ranking: Vec<RankedTraderRow>,
    pub diagnostics: Diagnostics,
}

impl PipelineOutcome {
    pub fn is_empty(&self) -> bool {
        self.diagnostics.empty_result
    }
}

/// Run every stage over an in-memory batch of rows
pub fn run_pipeline(config: &PipelineConfig, rows: &[RawTradeRow]) -> Result<PipelineOutcome, BubblemapError> {
    let validated = config.validate()?;
    Ok(run_validated(&validated, rows))
}

/// Validate, fetch from `source`, then run the pipeline.
///
/// Invalid configuration is reported before any upstream call is made.
pub async fn build_bubblemap(
    source: &dyn TradeSource,
    config: &PipelineConfig,
) -> Result<PipelineOutcome, BubblemapError> {
    let validated = config.validate()?;

    tracing::info!(
        "Fetching trades for {} on {} ({} to {}) from {}",
        validated.scope.token_address,
        validated.scope.chain.as_str(),
        validated.scope.date_range.start,
        validated.scope.date_range.end,
        source.source_name()
    );

    let rows = source.fetch_trades(&validated.scope).await?;

    Ok(run_validated(&validated, &rows))
}

fn run_validated(validated: &ValidatedConfig, rows: &[RawTradeRow]) -> PipelineOutcome {
    let normalized = TradeNormalizer::new(&validated.scope).normalize(rows);
    let aggregates = aggregate_traders(&normalized.records);
    let active = TopTraderSelector::new(validated.selection.clone()).select(&aggregates);
    let graph = TraderGraph::build(active, &normalized.records, validated.connections.clone());

    let report = normalized.report;
    let diagnostics = Diagnostics {
        rows_received: report.rows_received,
        rows_accepted: report.rows_accepted,
        dropped_rows: report.dropped_rows,
        drop_reasons: report.drop_reasons,
        traders_aggregated: aggregates.len(),
        traders_selected: graph.nodes.len(),
        connections: graph.edges.len(),
        isolated_traders: graph.isolated_nodes().len(),
        empty_result: graph.nodes.is_empty(),
    };

    tracing::info!(
        "Bubblemap for {} on {}: {} traders, {} connections ({} rows, {} dropped)",
        validated.scope.token_address,
        validated.scope.chain.as_str(),
        diagnostics.traders_selected,
        diagnostics.connections,
        diagnostics.rows_received,
        diagnostics.dropped_rows
    );

    PipelineOutcome {
        graph: export_graph(&graph),
        ranking: ranking_table(&graph.nodes),
        diagnostics,
    }
}
