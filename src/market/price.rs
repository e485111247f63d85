use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::cache::{Clock, TtlCache};
use crate::error::RpcError;
use crate::market::{json_f64, CoinListing, GlobalMetrics, PriceProvider, PriceQuote};
use crate::models::token::token_by_symbol;

pub const PRICE_CACHE_TTL: Duration = Duration::from_secs(60);

/// Coins priced by CoinGecko id only (no Solana mint)
const EXTRA_COINGECKO_IDS: &[(&str, &str)] = &[("BTC", "bitcoin"), ("ETH", "ethereum")];

fn coingecko_id(symbol: &str) -> Option<&'static str> {
    if let Some(token) = token_by_symbol(symbol) {
        return Some(token.coingecko_id);
    }
    EXTRA_COINGECKO_IDS
        .iter()
        .find(|(s, _)| s.eq_ignore_ascii_case(symbol))
        .map(|(_, id)| *id)
}

#[derive(Debug, Deserialize)]
struct MarketRow {
    symbol: String,
    name: String,
    current_price: Option<f64>,
    market_cap: Option<f64>,
    market_cap_rank: Option<u32>,
    price_change_percentage_24h: Option<f64>,
}

/// Jupiter Price API first for Solana mints, CoinGecko for everything else
/// and for market-wide data. Spot prices are cached for [`PRICE_CACHE_TTL`]
/// and served stale when both sources fail.
pub struct HttpPriceProvider {
    http: reqwest::Client,
    jupiter_price_url: String,
    coingecko_base_url: String,
    symbol_cache: Mutex<TtlCache<String, PriceQuote>>,
    mint_cache: Mutex<TtlCache<String, f64>>,
    clock: Arc<dyn Clock>,
}

impl HttpPriceProvider {
    pub fn new(http: reqwest::Client, jupiter_price_url: &str, coingecko_base_url: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            http,
            jupiter_price_url: jupiter_price_url.trim_end_matches('/').to_string(),
            coingecko_base_url: coingecko_base_url.trim_end_matches('/').to_string(),
            symbol_cache: Mutex::new(TtlCache::new(PRICE_CACHE_TTL)),
            mint_cache: Mutex::new(TtlCache::new(PRICE_CACHE_TTL)),
            clock,
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value, RpcError> {
        debug!("GET {}", url);
        Ok(self.http.get(url).send().await?.error_for_status()?.json().await?)
    }

    async fn jupiter_price(&self, mint: &str) -> Result<Option<f64>, RpcError> {
        let url = format!("{}?ids={}", self.jupiter_price_url, mint);
        let body = self.get_json(&url).await?;
        Ok(body
            .get("data")
            .and_then(|data| data.get(mint))
            .and_then(|entry| entry.get("price"))
            .and_then(json_f64))
    }

    async fn coingecko_price(&self, symbol: &str, id: &str) -> Result<Option<PriceQuote>, RpcError> {
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd&include_24hr_change=true",
            self.coingecko_base_url, id
        );
        let body = self.get_json(&url).await?;
        let Some(entry) = body.get(id) else {
            return Ok(None);
        };
        Ok(entry.get("usd").and_then(json_f64).map(|price_usd| PriceQuote {
            symbol: symbol.to_string(),
            price_usd,
            change_24h: entry.get("usd_24h_change").and_then(json_f64),
        }))
    }

    async fn fetch_spot_price(&self, symbol: &str) -> Result<Option<PriceQuote>, RpcError> {
        let mut last_error = None;

        if let Some(token) = token_by_symbol(symbol) {
            match self.jupiter_price(token.mint).await {
                Ok(Some(price_usd)) => {
                    return Ok(Some(PriceQuote { symbol: symbol.to_string(), price_usd, change_24h: None }))
                }
                Ok(None) => debug!("Jupiter has no price for {}", symbol),
                Err(e) => {
                    warn!("Jupiter price lookup for {} failed: {}", symbol, e);
                    last_error = Some(e);
                }
            }
        }

        if let Some(id) = coingecko_id(symbol) {
            match self.coingecko_price(symbol, id).await {
                Ok(quote) => return Ok(quote),
                Err(e) => {
                    warn!("CoinGecko price lookup for {} failed: {}", symbol, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl PriceProvider for HttpPriceProvider {
    async fn get_spot_price(&self, symbol: &str) -> Result<Option<PriceQuote>, RpcError> {
        let key = symbol.to_uppercase();
        {
            let cache = self.symbol_cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(quote) = cache.get_fresh(&key, self.clock.now()) {
                return Ok(Some(quote));
            }
        }

        match self.fetch_spot_price(&key).await {
            Ok(Some(quote)) => {
                let mut cache = self.symbol_cache.lock().unwrap_or_else(PoisonError::into_inner);
                cache.insert(key, quote.clone(), self.clock.now());
                Ok(Some(quote))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                let cache = self.symbol_cache.lock().unwrap_or_else(PoisonError::into_inner);
                match cache.get_stale(&key) {
                    Some(quote) => {
                        warn!("Serving stale {} price after error: {}", key, e);
                        Ok(Some(quote))
                    }
                    None => Err(e),
                }
            }
        }
    }

    async fn get_mint_price(&self, mint: &str) -> Result<Option<f64>, RpcError> {
        {
            let cache = self.mint_cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(price) = cache.get_fresh(mint, self.clock.now()) {
                return Ok(Some(price));
            }
        }

        match self.jupiter_price(mint).await {
            Ok(Some(price)) => {
                let mut cache = self.mint_cache.lock().unwrap_or_else(PoisonError::into_inner);
                cache.insert(mint.to_string(), price, self.clock.now());
                Ok(Some(price))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                let stale = self.mint_cache.lock().unwrap_or_else(PoisonError::into_inner).get_stale(mint);
                stale.map(Some).ok_or(e)
            }
        }
    }

    async fn get_listings(&self, limit: usize) -> Result<Vec<CoinListing>, RpcError> {
        let url = format!(
            "{}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page={}&page=1",
            self.coingecko_base_url, limit
        );
        let body = self.get_json(&url).await?;
        let rows: Vec<MarketRow> =
            serde_json::from_value(body).map_err(|e| RpcError::invalid_response(format!("coins/markets: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| CoinListing {
                rank: row.market_cap_rank,
                symbol: row.symbol.to_uppercase(),
                name: row.name,
                price_usd: row.current_price.unwrap_or(0.0),
                market_cap_usd: row.market_cap.unwrap_or(0.0),
                change_24h: row.price_change_percentage_24h,
            })
            .collect())
    }

    async fn get_global_metrics(&self) -> Result<GlobalMetrics, RpcError> {
        let url = format!("{}/global", self.coingecko_base_url);
        let body = self.get_json(&url).await?;
        parse_global_metrics(&body).ok_or_else(|| RpcError::invalid_response("global metrics payload missing data"))
    }
}

fn parse_global_metrics(body: &Value) -> Option<GlobalMetrics> {
    let data = body.get("data")?;
    Some(GlobalMetrics {
        total_market_cap_usd: data.get("total_market_cap")?.get("usd").and_then(json_f64)?,
        total_volume_usd: data
            .get("total_volume")
            .and_then(|v| v.get("usd"))
            .and_then(json_f64)
            .unwrap_or(0.0),
        btc_dominance: data
            .get("market_cap_percentage")
            .and_then(|v| v.get("btc"))
            .and_then(json_f64)
            .unwrap_or(0.0),
        market_cap_change_24h: data.get("market_cap_change_percentage_24h_usd").and_then(json_f64),
    })
}
