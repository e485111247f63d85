use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{debug, info};
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;

use crate::error::RpcError;
use crate::market::{json_f64, PreparedSwap, SwapAggregator, SwapQuote};

/// Jupiter Swap API (`/swap/v1/quote`, `/swap/v1/swap`)
pub struct JupiterClient {
    http: reqwest::Client,
    base_url: String,
    slippage_bps: u16,
}

impl JupiterClient {
    pub fn new(http: reqwest::Client, base_url: &str, slippage_bps: u16) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            slippage_bps,
        }
    }
}

#[async_trait]
impl SwapAggregator for JupiterClient {
    async fn get_quote(&self, input_mint: &str, output_mint: &str, amount: u64) -> Result<SwapQuote, RpcError> {
        let url = format!(
            "{}/swap/v1/quote?inputMint={}&outputMint={}&amount={}&slippageBps={}",
            self.base_url, input_mint, output_mint, amount, self.slippage_bps
        );
        debug!("Requesting Jupiter quote: {}", url);

        let body: Value = self.http.get(&url).send().await?.error_for_status()?.json().await?;
        parse_quote(body)
    }

    async fn prepare_transaction(&self, user: &Pubkey, quote: &SwapQuote) -> Result<PreparedSwap, RpcError> {
        let request = json!({
            "userPublicKey": user.to_string(),
            "quoteResponse": quote.raw,
            "wrapAndUnwrapSol": true,
            "dynamicComputeUnitLimit": true
        });

        let body: Value = self
            .http
            .post(format!("{}/swap/v1/swap", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let prepared = decode_swap_response(&body)?;
        info!(
            "Jupiter built swap transaction for {} (valid until block {})",
            user, prepared.last_valid_block_height
        );
        Ok(prepared)
    }
}

fn amount_field(body: &Value, field: &str) -> Result<u64, RpcError> {
    body.get(field)
        .and_then(|v| match v {
            Value::String(s) => s.parse().ok(),
            other => other.as_u64(),
        })
        .ok_or_else(|| RpcError::invalid_response(format!("quote is missing {}", field)))
}

fn parse_quote(body: Value) -> Result<SwapQuote, RpcError> {
    if let Some(err) = body.get("error").and_then(Value::as_str) {
        return Err(RpcError::from_message(err));
    }

    let text = |field: &str| {
        body.get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RpcError::invalid_response(format!("quote is missing {}", field)))
    };

    Ok(SwapQuote {
        input_mint: text("inputMint")?,
        output_mint: text("outputMint")?,
        in_amount: amount_field(&body, "inAmount")?,
        out_amount: amount_field(&body, "outAmount")?,
        price_impact_pct: body.get("priceImpactPct").and_then(json_f64).unwrap_or(0.0),
        raw: body,
    })
}

/// base64 + bincode encoded `VersionedTransaction`
fn decode_swap_response(body: &Value) -> Result<PreparedSwap, RpcError> {
    let encoded = body
        .get("swapTransaction")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::invalid_response("swap response has no swapTransaction"))?;

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| RpcError::invalid_response(format!("swapTransaction is not base64: {}", e)))?;
    let transaction: VersionedTransaction = bincode::deserialize(&bytes)
        .map_err(|e| RpcError::invalid_response(format!("swapTransaction does not decode: {}", e)))?;

    Ok(PreparedSwap {
        transaction,
        last_valid_block_height: body.get("lastValidBlockHeight").and_then(Value::as_u64).unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solana::rpc_helpers::build_sol_transfer;
    use solana_sdk::hash::Hash;

    #[test]
    fn parses_string_amounts() {
        let quote = parse_quote(json!({
            "inputMint": "So11111111111111111111111111111111111111112",
            "inAmount": "1000000000",
            "outputMint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
            "outAmount": "151234567",
            "priceImpactPct": "0.0012",
            "routePlan": []
        }))
        .unwrap();

        assert_eq!(quote.in_amount, 1_000_000_000);
        assert_eq!(quote.out_amount, 151_234_567);
        assert_eq!(quote.price_impact_pct, 0.0012);
        assert!(quote.raw.get("routePlan").is_some());
    }

    #[test]
    fn surfaces_aggregator_errors() {
        let err = parse_quote(json!({ "error": "Could not find any route", "errorCode": "COULD_NOT_FIND_ANY_ROUTE" }))
            .unwrap_err();
        assert!(err.message.contains("route"));
        assert!(parse_quote(json!({ "inputMint": "a" })).is_err());
    }

    #[test]
    fn decodes_swap_transaction() {
        let tx = build_sol_transfer(&Pubkey::new_unique(), &Pubkey::new_unique(), 5, Hash::new_unique());
        let encoded = STANDARD.encode(bincode::serialize(&tx).unwrap());
        let prepared = decode_swap_response(&json!({
            "swapTransaction": encoded,
            "lastValidBlockHeight": 279_000_123u64
        }))
        .unwrap();

        assert_eq!(prepared.last_valid_block_height, 279_000_123);
        assert_eq!(prepared.transaction.message.recent_blockhash(), tx.message.recent_blockhash());
    }
}
