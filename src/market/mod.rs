//! Market-data collaborators: prices, indexed token holdings, the swap
//! aggregator and meme-token analysis. Each is a trait with one HTTP-backed
//! implementation so services can be exercised against in-memory fakes.

pub mod jupiter;
pub mod meme;
pub mod price;
pub mod token_index;

pub use jupiter::JupiterClient;
pub use meme::{score_meme, DexScreenerAnalyzer};
pub use price::HttpPriceProvider;
pub use token_index::HeliusTokenIndex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;
use std::time::Duration;

use crate::error::RpcError;

/// USD spot price of a coin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub price_usd: f64,
    /// Percent change over 24h, when the source reports it
    pub change_24h: Option<f64>,
}

/// One row of the top-coins listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinListing {
    pub rank: Option<u32>,
    pub symbol: String,
    pub name: String,
    pub price_usd: f64,
    pub market_cap_usd: f64,
    pub change_24h: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalMetrics {
    pub total_market_cap_usd: f64,
    pub total_volume_usd: f64,
    pub btc_dominance: f64,
    pub market_cap_change_24h: Option<f64>,
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Spot price by ticker; `Ok(None)` when no source knows the symbol
    async fn get_spot_price(&self, symbol: &str) -> Result<Option<PriceQuote>, RpcError>;

    /// USD price of an arbitrary mint, used to value wallet holdings
    async fn get_mint_price(&self, mint: &str) -> Result<Option<f64>, RpcError>;

    async fn get_listings(&self, limit: usize) -> Result<Vec<CoinListing>, RpcError>;

    async fn get_global_metrics(&self) -> Result<GlobalMetrics, RpcError>;
}

/// A fungible holding as returned by an indexed metadata provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedToken {
    pub mint: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub logo_uri: Option<String>,
    pub balance: f64,
    pub decimals: u8,
    pub usd_value: Option<f64>,
}

/// Fast, enriched token holdings for an owner. Best effort: may be empty.
#[async_trait]
pub trait TokenIndex: Send + Sync {
    async fn get_holdings(&self, owner: &Pubkey) -> Result<Vec<IndexedToken>, RpcError>;
}

/// Route quote from the swap aggregator. Amounts are raw base units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: u64,
    pub out_amount: u64,
    pub price_impact_pct: f64,
    /// Aggregator payload, echoed back when requesting the transaction
    pub raw: serde_json::Value,
}

/// Unsigned swap transaction built by the aggregator for a quote
#[derive(Debug, Clone)]
pub struct PreparedSwap {
    pub transaction: VersionedTransaction,
    pub last_valid_block_height: u64,
}

#[async_trait]
pub trait SwapAggregator: Send + Sync {
    async fn get_quote(&self, input_mint: &str, output_mint: &str, amount: u64) -> Result<SwapQuote, RpcError>;

    async fn prepare_transaction(&self, user: &Pubkey, quote: &SwapQuote) -> Result<PreparedSwap, RpcError>;
}

/// Trading data for one token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMarketData {
    pub mint: String,
    pub symbol: String,
    pub name: String,
    pub price_usd: f64,
    pub liquidity_usd: f64,
    pub volume_24h_usd: f64,
    pub price_change_24h: f64,
    pub fdv_usd: Option<f64>,
    pub pair_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prediction {
    Bullish,
    Neutral,
    Bearish,
}

impl Prediction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Neutral => "neutral",
            Self::Bearish => "bearish",
        }
    }
}

/// Threshold-based read of a token's market data. Not a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemeAnalysis {
    pub market: TokenMarketData,
    pub prediction: Prediction,
    /// 5..=95
    pub confidence: u8,
    pub risk_flags: Vec<String>,
}

#[async_trait]
pub trait MemeAnalyzer: Send + Sync {
    /// `Ok(None)` when no trading pair exists for the mint
    async fn analyze(&self, mint: &str) -> Result<Option<MemeAnalysis>, RpcError>;
}

/// Shared HTTP client with JSON headers and a per-request timeout
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Numeric JSON field that some APIs send as a string
pub(crate) fn json_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
