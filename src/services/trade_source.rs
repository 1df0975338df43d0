use async_trait::async_trait;

use crate::error::UpstreamError;
use crate::models::trade::{ChainFamily, RawTradeRow};
use crate::services::pipeline_config::QueryScope;

/// Anything that can produce the raw trade rows for one query scope
#[async_trait]
pub trait TradeSource: Send + Sync {
    async fn fetch_trades(&self, scope: &QueryScope) -> Result<Vec<RawTradeRow>, UpstreamError>;

    fn source_name(&self) -> &str;
}

/// SQL returning one row per token transfer/swap in the scope, in the row
/// shape the normalizer expects for the chain's family.
pub fn build_trade_query(scope: &QueryScope) -> String {
    match scope.chain.family() {
        ChainFamily::Evm => build_evm_query(scope),
        ChainFamily::Solana => build_solana_query(scope),
    }
}

fn build_evm_query(scope: &QueryScope) -> String {
    let token = escape_literal(&scope.token_address);
    let start = scope.date_range.start.format("%Y-%m-%d");
    let end = scope.date_range.end.format("%Y-%m-%d");

    format!(
        r#"
    SELECT
        from_address,
        to_address,
        contract_address,
        amount,
        amount_usd,
        block_timestamp
    FROM {chain}.core.ez_token_transfers
    WHERE contract_address = LOWER(TRIM('{token}'))
        AND block_timestamp >= '{start}'
        AND block_timestamp < DATEADD(day, 1, '{end}')::date
    ORDER BY block_timestamp
    "#,
        chain = scope.chain.as_str(),
    )
}

fn build_solana_query(scope: &QueryScope) -> String {
    let token = escape_literal(&scope.token_address);
    let start = scope.date_range.start.format("%Y-%m-%d");
    let end = scope.date_range.end.format("%Y-%m-%d");

    // Pool swaps have no wallet counterparty; wallet-to-wallet transfers do.
    // Unpriced transfers keep a zero USD value so their edges survive.
    format!(
        r#"
    SELECT
        swapper,
        NULL AS counterparty,
        NULL AS mint,
        swap_from_mint,
        swap_to_mint,
        CASE WHEN swap_to_mint = '{token}' THEN swap_to_amount ELSE swap_from_amount END AS amount,
        COALESCE(swap_from_amount_usd, swap_to_amount_usd) AS amount_usd,
        block_timestamp
    FROM solana.defi.ez_dex_swaps
    WHERE (swap_from_mint = '{token}' OR swap_to_mint = '{token}')
        AND block_timestamp >= '{start}'
        AND block_timestamp < DATEADD(day, 1, '{end}')::date

    UNION ALL

    SELECT
        ft.tx_from AS swapper,
        ft.tx_to AS counterparty,
        ft.mint,
        NULL AS swap_from_mint,
        NULL AS swap_to_mint,
        ft.amount,
        ft.amount * COALESCE(p.price, 0) AS amount_usd,
        ft.block_timestamp
    FROM solana.core.fact_transfers ft
    LEFT JOIN solana.price.ez_prices_hourly p
        ON p.token_address = '{token}'
        AND DATE_TRUNC('hour', ft.block_timestamp) = p.hour
    WHERE ft.mint = '{token}'
        AND ft.block_timestamp >= '{start}'
        AND ft.block_timestamp < DATEADD(day, 1, '{end}')::date
    "#
    )
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trade::Chain;
    use crate::services::pipeline_config::DateRange;
    use chrono::NaiveDate;

    fn scope(chain: Chain, token: &str) -> QueryScope {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
        )
        .unwrap();
        QueryScope::new(token, chain, range).unwrap()
    }

    #[test]
    fn test_evm_query_targets_chain_schema() {
        let sql = build_trade_query(&scope(Chain::Arbitrum, "0xABC"));

        assert!(sql.contains("FROM arbitrum.core.ez_token_transfers"));
        assert!(sql.contains("LOWER(TRIM('0xabc'))"));
        assert!(sql.contains("block_timestamp >= '2024-03-01'"));
        assert!(sql.contains("DATEADD(day, 1, '2024-03-07')"));
        assert!(sql.contains("amount,\n        amount_usd"));
    }

    #[test]
    fn test_solana_query_has_swaps_and_transfers() {
        let sql = build_trade_query(&scope(Chain::Solana, "MintXyz"));

        assert!(sql.contains("solana.defi.ez_dex_swaps"));
        assert!(sql.contains("solana.core.fact_transfers"));
        assert!(sql.contains("swap_to_mint = 'MintXyz'"));
        assert!(sql.contains("UNION ALL"));
        assert!(sql.contains("ft.amount * COALESCE(p.price, 0) AS amount_usd"));
        assert!(sql.contains("THEN swap_to_amount ELSE swap_from_amount END AS amount"));
    }

    #[test]
    fn test_quotes_escaped() {
        let sql = build_trade_query(&scope(Chain::Solana, "Mint'; DROP TABLE x; --"));
        assert!(sql.contains("'Mint''; DROP TABLE x; --'"));
        assert!(!sql.contains("'Mint';"));
    }
}
