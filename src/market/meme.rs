use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use crate::error::RpcError;
use crate::market::{json_f64, MemeAnalysis, MemeAnalyzer, Prediction, TokenMarketData};

const LOW_LIQUIDITY_USD: f64 = 10_000.0;
const DEEP_LIQUIDITY_USD: f64 = 100_000.0;
const HIGH_VOLUME_USD: f64 = 1_000_000.0;
const MOMENTUM_PCT: f64 = 20.0;

/// Threshold heuristic over a token's 24h market data.
///
/// Strong gains backed by turnover above liquidity read as bullish, drops
/// beyond the momentum threshold as bearish. Confidence only reflects how
/// much liquidity and volume back the reading.
pub fn score_meme(market: TokenMarketData) -> MemeAnalysis {
    let mut risk_flags = Vec::new();
    if market.liquidity_usd < LOW_LIQUIDITY_USD {
        risk_flags.push("Low liquidity (under $10K)".to_string());
    }

    let turnover = if market.liquidity_usd > 0.0 {
        market.volume_24h_usd / market.liquidity_usd
    } else {
        0.0
    };

    let prediction = if market.price_change_24h > MOMENTUM_PCT && turnover > 1.0 {
        Prediction::Bullish
    } else if market.price_change_24h < -MOMENTUM_PCT {
        Prediction::Bearish
    } else {
        Prediction::Neutral
    };

    let mut confidence: i32 = 50;
    if market.liquidity_usd >= DEEP_LIQUIDITY_USD {
        confidence += 15;
    }
    if market.volume_24h_usd >= HIGH_VOLUME_USD {
        confidence += 10;
    }
    if market.liquidity_usd < LOW_LIQUIDITY_USD {
        confidence -= 20;
    }

    MemeAnalysis {
        market,
        prediction,
        confidence: confidence.clamp(5, 95) as u8,
        risk_flags,
    }
}

/// Pair data from DexScreener, scored with [`score_meme`]
pub struct DexScreenerAnalyzer {
    http: reqwest::Client,
    base_url: String,
}

impl DexScreenerAnalyzer {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_string() }
    }
}

#[async_trait]
impl MemeAnalyzer for DexScreenerAnalyzer {
    async fn analyze(&self, mint: &str) -> Result<Option<MemeAnalysis>, RpcError> {
        let url = format!("{}/latest/dex/tokens/{}", self.base_url, mint);
        debug!("GET {}", url);
        let body: Value = self.http.get(&url).send().await?.error_for_status()?.json().await?;
        Ok(deepest_solana_pair(&body, mint).map(score_meme))
    }
}

/// Solana pair with the most liquidity
fn deepest_solana_pair(body: &Value, mint: &str) -> Option<TokenMarketData> {
    let pairs = body.get("pairs")?.as_array()?;
    pairs
        .iter()
        .filter(|p| p.get("chainId").and_then(Value::as_str) == Some("solana"))
        .filter_map(|p| parse_pair(p, mint))
        .max_by(|a, b| a.liquidity_usd.total_cmp(&b.liquidity_usd))
}

fn parse_pair(pair: &Value, mint: &str) -> Option<TokenMarketData> {
    let base = pair.get("baseToken")?;
    let nested = |outer: &str, inner: &str| pair.get(outer).and_then(|v| v.get(inner)).and_then(json_f64);

    Some(TokenMarketData {
        mint: mint.to_string(),
        symbol: base.get("symbol").and_then(Value::as_str).unwrap_or("?").to_string(),
        name: base.get("name").and_then(Value::as_str).unwrap_or("Unknown").to_string(),
        price_usd: pair.get("priceUsd").and_then(json_f64)?,
        liquidity_usd: nested("liquidity", "usd").unwrap_or(0.0),
        volume_24h_usd: nested("volume", "h24").unwrap_or(0.0),
        price_change_24h: nested("priceChange", "h24").unwrap_or(0.0),
        fdv_usd: pair.get("fdv").and_then(json_f64),
        pair_url: pair.get("url").and_then(Value::as_str).map(str::to_string),
    })
}
