use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use std::env;
use std::fs;
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bubblemap_backend::models::trade::{Chain, RawTradeRow};
use bubblemap_backend::services::connection_graph::WeightBasis;
use bubblemap_backend::services::pipeline::run_pipeline;
use bubblemap_backend::services::pipeline_config::PipelineConfig;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bubblemap_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 6 && args.len() != 7 {
        eprintln!(
            "Usage: {} <rows.json> <chain> <token_address> <start_date> <end_date> [output.json]",
            args[0]
        );
        eprintln!(
            "Example: {} pepe_rows.json ethereum 0x6982508145454ce325ddbe47a25d4ec3d2311933 2024-03-01 2024-03-07 graph.json",
            args[0]
        );
        std::process::exit(1);
    }

    dotenvy::dotenv().ok();

    let rows_file = &args[1];
    let chain = Chain::from_str(&args[2]).ok_or_else(|| anyhow!("Unsupported chain '{}'", args[2]))?;
    let start_date = parse_date(&args[4])?;
    let end_date = parse_date(&args[5])?;

    let mut config = PipelineConfig::new(&args[3], chain, start_date, end_date);
    apply_env_overrides(&mut config)?;

    // Read raw warehouse rows
    let raw_json = fs::read_to_string(rows_file).with_context(|| format!("Failed to read {}", rows_file))?;
    let values: Vec<Value> = serde_json::from_str(&raw_json).context("Rows file must hold a JSON array")?;
    let rows: Vec<RawTradeRow> = values
        .into_iter()
        .map(|value| RawTradeRow::decode(chain.family(), value))
        .collect();

    let outcome = run_pipeline(&config, &rows)?;

    eprintln!(
        "{} rows ({} dropped) -> {} traders, {} connections",
        outcome.diagnostics.rows_received,
        outcome.diagnostics.dropped_rows,
        outcome.diagnostics.traders_selected,
        outcome.diagnostics.connections
    );

    let output = serde_json::to_string_pretty(&outcome)?;
    match args.get(6) {
        Some(path) => {
            fs::write(path, output).with_context(|| format!("Failed to write {}", path))?;
            eprintln!("✓ Wrote bubblemap to {}", path);
        }
        None => println!("{}", output),
    }

    Ok(())
}

fn parse_date(raw: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("'{}' is not a YYYY-MM-DD date", raw))
}

fn apply_env_overrides(config: &mut PipelineConfig) -> anyhow::Result<()> {
    if let Ok(raw) = env::var("BUBBLEMAP_MIN_VOLUME") {
        config.min_volume = Decimal::from_str(raw.trim()).context("BUBBLEMAP_MIN_VOLUME")?;
    }
    if let Ok(raw) = env::var("BUBBLEMAP_MIN_TRADES") {
        config.min_trades = raw.trim().parse().context("BUBBLEMAP_MIN_TRADES")?;
    }
    if let Ok(raw) = env::var("BUBBLEMAP_MAX_TRADERS") {
        config.max_traders = raw.trim().parse().context("BUBBLEMAP_MAX_TRADERS")?;
    }
    if let Ok(raw) = env::var("BUBBLEMAP_MIN_CONNECTION_STRENGTH") {
        config.min_connection_strength = Decimal::from_str(raw.trim()).context("BUBBLEMAP_MIN_CONNECTION_STRENGTH")?;
    }
    if let Ok(raw) = env::var("BUBBLEMAP_WEIGHT_BASIS") {
        config.weight_basis = WeightBasis::from_str(&raw).ok_or_else(|| anyhow!("Unknown weight basis '{}'", raw))?;
    }
    Ok(())
}
