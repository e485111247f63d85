use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::market::{PriceProvider, SwapAggregator};
use crate::models::token::token_by_symbol;
use crate::models::{ErrorKind, KnownToken, OperationResult, SwapRequest, WalletSnapshot};
use crate::services::{broadcast_failure, signer_failure, WalletDataProvider};
use crate::solana::client::ConfirmationStatus;
use crate::solana::{ConnectionManager, RequestKind, WalletSigner};
use crate::utils::{explorer_url, format_token_amount, from_base_units, to_base_units};

#[derive(Debug, Clone)]
pub struct SwapConfig {
    /// SOL held back for fees when swapping out of SOL
    pub fee_reserve_sol: f64,
    /// Wait between broadcast and re-reading balances
    pub settle_delay: Duration,
    pub explorer_base_url: String,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            fee_reserve_sol: 0.01,
            settle_delay: Duration::from_secs(2),
            explorer_base_url: "https://solscan.io".to_string(),
        }
    }
}

/// Why a swap request was turned down before anything was sent
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{reason}")]
pub struct SwapRejection {
    pub kind: ErrorKind,
    pub reason: String,
}

impl SwapRejection {
    fn new(kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self { kind, reason: reason.into() }
    }
}

impl From<SwapRejection> for OperationResult {
    fn from(rejection: SwapRejection) -> Self {
        OperationResult::failure(rejection.kind, rejection.reason)
    }
}

/// A request whose tokens are supported and whose amount parsed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedSwap {
    pub from: &'static KnownToken,
    pub to: &'static KnownToken,
    pub amount: f64,
}

/// Non-executing preview of a swap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapEstimate {
    pub from_token: String,
    pub to_token: String,
    pub from_amount: f64,
    pub to_amount: f64,
    pub price_impact: f64,
    /// USD value of the input, when a price is known
    pub usd_value: Option<f64>,
    /// 24h change of the output token, in percent
    pub trend: Option<f64>,
}

/// Aggregator swaps with balance-diff verification
pub struct SwapService {
    wallet_data: Arc<WalletDataProvider>,
    aggregator: Arc<dyn SwapAggregator>,
    prices: Arc<dyn PriceProvider>,
    connections: Arc<ConnectionManager>,
    config: SwapConfig,
}

impl SwapService {
    pub fn new(
        wallet_data: Arc<WalletDataProvider>,
        aggregator: Arc<dyn SwapAggregator>,
        prices: Arc<dyn PriceProvider>,
        connections: Arc<ConnectionManager>,
        config: SwapConfig,
    ) -> Self {
        Self { wallet_data, aggregator, prices, connections, config }
    }

    /// Checks that need no wallet state: supported tokens, distinct tokens,
    /// positive amount
    pub fn validate_request(&self, request: &SwapRequest) -> Result<ValidatedSwap, SwapRejection> {
        let supported = |symbol: &str| {
            token_by_symbol(symbol).ok_or_else(|| {
                SwapRejection::new(ErrorKind::UnsupportedToken, format!("Unsupported token: {}", symbol.to_uppercase()))
            })
        };
        let from = supported(&request.from_token)?;
        let to = supported(&request.to_token)?;

        if from.mint == to.mint {
            return Err(SwapRejection::new(ErrorKind::SameToken, "cannot swap a token to itself"));
        }

        let amount = request
            .amount
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|a| a.is_finite() && *a > 0.0)
            .ok_or_else(|| {
                SwapRejection::new(ErrorKind::InvalidAmount, format!("Invalid amount: {}", request.amount))
            })?;

        Ok(ValidatedSwap { from, to, amount })
    }

    /// Full validation against the wallet's current balances
    pub fn validate(&self, request: &SwapRequest, snapshot: &WalletSnapshot) -> Result<ValidatedSwap, SwapRejection> {
        let swap = self.validate_request(request)?;

        let held = snapshot.balance_of_mint(swap.from.mint);
        let available = if swap.from.is_native() {
            (held - self.config.fee_reserve_sol).max(0.0)
        } else {
            held
        };

        if swap.amount > available {
            let reserve_note = if swap.from.is_native() {
                format!(
                    " ({} {} usable after keeping {} SOL for fees)",
                    format_token_amount(available, swap.from.symbol),
                    swap.from.symbol,
                    self.config.fee_reserve_sol
                )
            } else {
                String::new()
            };
            return Err(SwapRejection::new(
                ErrorKind::InsufficientBalance,
                format!(
                    "Insufficient {} balance: you have {} {}{}, need {}.",
                    swap.from.symbol,
                    format_token_amount(held, swap.from.symbol),
                    swap.from.symbol,
                    reserve_note,
                    format_token_amount(swap.amount, swap.from.symbol)
                ),
            ));
        }

        Ok(swap)
    }

    /// Quote and price lookup only. Never signs.
    pub async fn get_swap_estimate(&self, request: &SwapRequest) -> Result<SwapEstimate, SwapRejection> {
        let swap = self.validate_request(request)?;
        let quote = self
            .aggregator
            .get_quote(swap.from.mint, swap.to.mint, to_base_units(swap.amount, swap.from.decimals))
            .await
            .map_err(|e| SwapRejection::new(ErrorKind::QuoteFailed, format!("Could not get a quote: {}", e)))?;

        let from_price = self.prices.get_spot_price(swap.from.symbol).await.ok().flatten();
        let to_price = self.prices.get_spot_price(swap.to.symbol).await.ok().flatten();

        Ok(SwapEstimate {
            from_token: swap.from.symbol.to_string(),
            to_token: swap.to.symbol.to_string(),
            from_amount: swap.amount,
            to_amount: from_base_units(quote.out_amount, swap.to.decimals),
            price_impact: quote.price_impact_pct,
            usd_value: from_price.map(|p| p.price_usd * swap.amount),
            trend: to_price.and_then(|p| p.change_24h),
        })
    }

    /// Quote, sign, broadcast, then judge the outcome by how balances moved.
    ///
    /// A confirmation error does not fail the swap: balances are re-read
    /// after the settle delay either way, and only an on-chain error reported
    /// by confirmation short-circuits verification.
    pub async fn execute_swap(&self, request: &SwapRequest, signer: &dyn WalletSigner) -> OperationResult {
        let owner = match signer.pubkey() {
            Some(pubkey) if signer.is_connected() => pubkey,
            _ => return OperationResult::failure(ErrorKind::WalletNotConnected, "Please connect your wallet first."),
        };
        let address = owner.to_string();

        if let Err(rejection) = self.validate_request(request) {
            return rejection.into();
        }

        let before = self.wallet_data.refresh_wallet_data(&address).await;
        if !before.is_reliable() {
            return OperationResult::failure(
                ErrorKind::NetworkError,
                "Could not load your balances, so the swap was not attempted.",
            );
        }
        let swap = match self.validate(request, &before) {
            Ok(swap) => swap,
            Err(rejection) => return rejection.into(),
        };
        let (from, to) = (swap.from, swap.to);
        info!("Swapping {} {} for {}", swap.amount, from.symbol, to.symbol);

        let quote = match self
            .aggregator
            .get_quote(from.mint, to.mint, to_base_units(swap.amount, from.decimals))
            .await
        {
            Ok(quote) if quote.out_amount > 0 => quote,
            Ok(_) => return OperationResult::failure(ErrorKind::QuoteFailed, "The quote returned no output amount."),
            Err(e) => return OperationResult::failure(ErrorKind::QuoteFailed, format!("Could not get a quote: {}", e)),
        };
        let expected_out = from_base_units(quote.out_amount, to.decimals);
        info!(
            "Quote: {} {} -> {} {} (impact {}%)",
            swap.amount, from.symbol, expected_out, to.symbol, quote.price_impact_pct
        );

        let prepared = match self.aggregator.prepare_transaction(&owner, &quote).await {
            Ok(prepared) => prepared,
            Err(e) => {
                return OperationResult::failure(ErrorKind::QuoteFailed, format!("Could not build the swap transaction: {}", e))
            }
        };
        let blockhash = *prepared.transaction.message.recent_blockhash();

        let signed = match signer.sign_transaction(prepared.transaction).await {
            Ok(tx) => tx,
            Err(e) => return signer_failure(e),
        };

        let signed_ref = &signed;
        let signature = match self
            .connections
            .make_request_with_attempts(RequestKind::Default, None, 1, move |rpc| async move {
                rpc.send_raw_transaction(signed_ref).await
            })
            .await
        {
            Ok(signature) => signature,
            Err(e) => return broadcast_failure(e),
        };
        let sig = signature.to_string();
        let url = explorer_url(&self.config.explorer_base_url, &sig);
        info!("Swap transaction sent: {}", sig);

        let connection = self.connections.get_connection(RequestKind::Default);
        match connection
            .client
            .confirm_transaction(&signature, &blockhash, prepared.last_valid_block_height)
            .await
        {
            Ok(ConfirmationStatus::Confirmed) => info!("Swap {} confirmed", sig),
            Ok(ConfirmationStatus::Failed(chain_error)) => {
                warn!("Swap {} failed on-chain: {}", sig, chain_error);
                return OperationResult::failure(ErrorKind::TransactionError, format!("Swap failed on-chain: {}", chain_error))
                    .with_transaction(&sig, url)
                    .with_details(json!({ "chainError": chain_error }));
            }
            Err(e) if e.kind.is_confirmation_ambiguous() => {
                warn!("Confirmation channel unavailable for {} ({:?}), verifying by balance", sig, e.kind)
            }
            Err(e) => warn!("Confirmation of {} failed, verifying by balance: {}", sig, e),
        }

        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        let after = self.wallet_data.refresh_wallet_data(&address).await;
        if !after.is_reliable() {
            warn!(
                "Post-swap balances for {} unusable (degraded={}, stale={}, tokens_complete={})",
                sig, after.degraded, after.stale, after.tokens_complete
            );
            return OperationResult::failure(
                ErrorKind::ConfirmationUnknown,
                "The swap was sent but your balances could not be re-read to verify it.",
            )
            .with_transaction(&sig, url);
        }

        let out_before = before.balance_of_mint(to.mint);
        let out_after = after.balance_of_mint(to.mint);
        let in_before = before.balance_of_mint(from.mint);
        let in_after = after.balance_of_mint(from.mint);

        if out_after <= out_before || in_after >= in_before {
            warn!(
                "Swap {} not reflected in balances: {} {} -> {}, {} {} -> {}",
                sig, to.symbol, out_before, out_after, from.symbol, in_before, in_after
            );
            return OperationResult::failure(
                ErrorKind::BalanceVerificationFailed,
                format!(
                    "The swap transaction was sent but your {} balance did not change as expected.",
                    if out_after <= out_before { to.symbol } else { from.symbol }
                ),
            )
            .with_transaction(&sig, url)
            .with_details(json!({
                "outputBefore": out_before,
                "outputAfter": out_after,
                "inputBefore": in_before,
                "inputAfter": in_after,
            }));
        }

        let received = out_after - out_before;
        let from_amount = format_token_amount(swap.amount, from.symbol);
        let to_amount = format_token_amount(received, to.symbol);
        info!("Swap {} verified: received {} {}", sig, to_amount, to.symbol);

        OperationResult::success(format!("Swapped {} {} for {} {}.", from_amount, from.symbol, to_amount, to.symbol))
            .with_transaction(&sig, url)
            .with_details(json!({
                "fromToken": from.symbol,
                "toToken": to.symbol,
                "fromAmount": from_amount,
                "toAmount": to_amount,
                "rawOutputAmount": quote.out_amount.to_string(),
                "expectedOutput": expected_out,
                "priceImpact": quote.price_impact_pct,
                "transactionId": sig,
            }))
    }
}
