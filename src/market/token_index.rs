use async_trait::async_trait;
use log::{debug, info};
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;

use crate::error::RpcError;
use crate::market::{json_f64, IndexedToken, TokenIndex};
use crate::utils::from_base_units;

/// Helius DAS `getAssetsByOwner` with fungible tokens included.
/// Without a configured URL every lookup returns no holdings.
pub struct HeliusTokenIndex {
    http: reqwest::Client,
    das_url: Option<String>,
}

impl HeliusTokenIndex {
    pub fn new(http: reqwest::Client, das_url: Option<String>) -> Self {
        if das_url.is_none() {
            info!("HELIUS_DAS_URL not set, token holdings will come from RPC enumeration");
        }
        Self { http, das_url }
    }
}

#[async_trait]
impl TokenIndex for HeliusTokenIndex {
    async fn get_holdings(&self, owner: &Pubkey) -> Result<Vec<IndexedToken>, RpcError> {
        let Some(url) = &self.das_url else {
            return Ok(Vec::new());
        };

        let request = json!({
            "jsonrpc": "2.0",
            "id": "sol-chat",
            "method": "getAssetsByOwner",
            "params": {
                "ownerAddress": owner.to_string(),
                "page": 1,
                "limit": 1000,
                "displayOptions": { "showFungible": true }
            }
        });

        let body: Value = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = body.get("error") {
            return Err(RpcError::from_message(err.to_string()));
        }

        let items = body
            .get("result")
            .and_then(|r| r.get("items"))
            .and_then(Value::as_array)
            .ok_or_else(|| RpcError::invalid_response("getAssetsByOwner returned no items"))?;

        let holdings: Vec<IndexedToken> = items.iter().filter_map(parse_das_asset).collect();
        debug!("DAS returned {} fungible holdings for {}", holdings.len(), owner);
        Ok(holdings)
    }
}

/// Fungible asset with a non-zero balance, or `None`
fn parse_das_asset(item: &Value) -> Option<IndexedToken> {
    let mint = item.get("id")?.as_str()?.to_string();
    let token_info = item.get("token_info")?;
    let raw = token_info.get("balance").and_then(json_f64)?;
    if raw <= 0.0 {
        return None;
    }
    let decimals = u8::try_from(token_info.get("decimals")?.as_u64()?).ok()?;

    let metadata = item.get("content").and_then(|c| c.get("metadata"));
    let text = |v: Option<&Value>| v.and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_string);

    Some(IndexedToken {
        symbol: text(token_info.get("symbol")).or_else(|| text(metadata.and_then(|m| m.get("symbol")))),
        name: text(metadata.and_then(|m| m.get("name"))),
        logo_uri: text(item.get("content").and_then(|c| c.get("links")).and_then(|l| l.get("image"))),
        balance: from_base_units(raw as u64, decimals),
        decimals,
        usd_value: token_info
            .get("price_info")
            .and_then(|p| p.get("total_price"))
            .and_then(json_f64),
        mint,
    })
}
