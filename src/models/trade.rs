use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Blockchains supported by the warehouse queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Solana,
    Ethereum,
    Arbitrum,
    Optimism,
    Base,
    Polygon,
    Avalanche,
    Bsc,
}

/// Row schema family a chain's warehouse tables follow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Evm,
    Solana,
}

impl Chain {
    pub fn all() -> [Chain; 8] {
        [
            Chain::Solana,
            Chain::Ethereum,
            Chain::Arbitrum,
            Chain::Optimism,
            Chain::Base,
            Chain::Polygon,
            Chain::Avalanche,
            Chain::Bsc,
        ]
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "solana" => Some(Chain::Solana),
            "ethereum" => Some(Chain::Ethereum),
            "arbitrum" => Some(Chain::Arbitrum),
            "optimism" => Some(Chain::Optimism),
            "base" => Some(Chain::Base),
            "polygon" => Some(Chain::Polygon),
            "avalanche" => Some(Chain::Avalanche),
            "bsc" => Some(Chain::Bsc),
            _ => None,
        }
    }

    /// Warehouse schema prefix, e.g. `ethereum` in `ethereum.core.ez_token_transfers`
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Solana => "solana",
            Chain::Ethereum => "ethereum",
            Chain::Arbitrum => "arbitrum",
            Chain::Optimism => "optimism",
            Chain::Base => "base",
            Chain::Polygon => "polygon",
            Chain::Avalanche => "avalanche",
            Chain::Bsc => "bsc",
        }
    }

    pub fn family(&self) -> ChainFamily {
        match self {
            Chain::Solana => ChainFamily::Solana,
            _ => ChainFamily::Evm,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Buy,
    Sell,
    Unknown,
}

impl TradeDirection {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "buy" => TradeDirection::Buy,
            "sell" => TradeDirection::Sell,
            _ => TradeDirection::Unknown,
        }
    }
}

/// Canonical, chain-agnostic trade record produced by the normalizer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub trader_address: String,
    pub counterparty_address: Option<String>,
    pub token_address: String,
    pub chain: Chain,
    pub usd_amount: Decimal,
    pub token_amount: Option<Decimal>, // absolute token units, when the warehouse reports them
    pub timestamp: DateTime<Utc>,
    pub direction: TradeDirection,
}

/// Row shape returned by EVM transfer/swap queries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvmTradeRow {
    #[serde(default)]
    pub from_address: Option<String>,
    #[serde(default)]
    pub to_address: Option<String>,
    #[serde(default, alias = "contract_address")]
    pub token_address: Option<String>,
    #[serde(default)]
    pub amount: Option<Value>,     // token units
    #[serde(default)]
    pub amount_usd: Option<Value>, // number, numeric string or null
    #[serde(default)]
    pub block_timestamp: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
}

/// Row shape returned by Solana swap/transfer queries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolanaTradeRow {
    #[serde(default)]
    pub swapper: Option<String>,
    #[serde(default)]
    pub counterparty: Option<String>,
    #[serde(default)]
    pub mint: Option<String>,
    #[serde(default)]
    pub swap_from_mint: Option<String>,
    #[serde(default)]
    pub swap_to_mint: Option<String>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub amount_usd: Option<Value>,
    #[serde(default)]
    pub block_timestamp: Option<String>,
}

/// Raw warehouse row, tagged by the schema family it came from.
///
/// `Undecodable` keeps a row that did not fit its family's shape so the
/// normalizer can drop and count it like any other bad row.
#[derive(Debug, Clone)]
pub enum RawTradeRow {
    Evm(EvmTradeRow),
    Solana(SolanaTradeRow),
    Undecodable(String),
}

impl RawTradeRow {
    /// Decode a JSON row, falling back to `Undecodable` instead of failing
    pub fn decode(family: ChainFamily, value: Value) -> Self {
        Self::from_json(family, value).unwrap_or_else(|e| RawTradeRow::Undecodable(e.to_string()))
    }

    /// Decode a JSON row object using the schema of the given chain family
    pub fn from_json(family: ChainFamily, value: Value) -> Result<Self, serde_json::Error> {
        match family {
            ChainFamily::Evm => Ok(RawTradeRow::Evm(serde_json::from_value(value)?)),
            ChainFamily::Solana => Ok(RawTradeRow::Solana(serde_json::from_value(value)?)),
        }
    }
}
