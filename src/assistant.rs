//! Entry point of the chat core: classify a message, dispatch it to the
//! right service and render a conversational reply.

use anyhow::{Context, Result};
use futures::FutureExt;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Clock, SystemClock};
use crate::config::Config;
use crate::error::classify_upstream_error;
use crate::market::{
    http_client, CoinListing, DexScreenerAnalyzer, GlobalMetrics, HeliusTokenIndex, HttpPriceProvider, JupiterClient,
    MemeAnalysis, MemeAnalyzer, PriceProvider,
};
use crate::models::{ErrorKind, Intent, OperationResult, SwapRequest, TransferRequest, WalletSnapshot};
use crate::parsing::parse_intent;
use crate::services::{
    SwapConfig, SwapService, TransactionRecord, TransferConfig, TransferService, WalletDataConfig, WalletDataProvider,
};
use crate::solana::{create_connection_manager_from_config, WalletSigner};
use crate::utils::{
    format_compact_usd, format_percent_change, format_token_amount, format_usd, lamports_to_sol, shorten_address,
};

pub const APOLOGY: &str = "Sorry, something went wrong while handling your request. Please try again in a moment.";

const HISTORY_LIMIT: usize = 5;
const LISTING_LIMIT: usize = 10;

const GREETING: &str = "Hi! I'm your Solana wallet assistant. I can check balances and prices, \
                        send SOL and swap tokens. Type \"help\" to see what you can ask.";

const HELP: &str = "Here's what I can do:\n\
                    - \"What's my balance?\" shows your tokens and their value\n\
                    - \"Show my recent transactions\"\n\
                    - \"What's the price of SOL?\" or \"Show me the market\"\n\
                    - \"Analyze <token address>\" for a quick meme-token read\n\
                    - \"Send 0.1 SOL to <address>\"\n\
                    - \"Swap 1 SOL to USDC\"";

/// Reply to one user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantResponse {
    pub message: String,
    pub intent: Option<Intent>,
}

pub struct Assistant {
    wallet_data: Arc<WalletDataProvider>,
    transfers: TransferService,
    swaps: SwapService,
    prices: Arc<dyn PriceProvider>,
    meme: Arc<dyn MemeAnalyzer>,
}

impl Assistant {
    pub fn new(
        wallet_data: Arc<WalletDataProvider>,
        transfers: TransferService,
        swaps: SwapService,
        prices: Arc<dyn PriceProvider>,
        meme: Arc<dyn MemeAnalyzer>,
    ) -> Self {
        Self { wallet_data, transfers, swaps, prices, meme }
    }

    /// Wire production collaborators from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let http = http_client(Duration::from_secs(config.http_timeout_secs))?;
        let connections = Arc::new(create_connection_manager_from_config(config)?);

        let prices: Arc<dyn PriceProvider> = Arc::new(HttpPriceProvider::new(
            http.clone(),
            &config.jupiter_price_url,
            &config.coingecko_base_url,
            clock.clone(),
        ));
        let token_index = Arc::new(HeliusTokenIndex::new(http.clone(), config.helius_das_url.clone()));
        let aggregator = Arc::new(JupiterClient::new(http.clone(), &config.jupiter_base_url, config.slippage_bps));
        let meme = Arc::new(DexScreenerAnalyzer::new(http, &config.dexscreener_base_url));

        let wallet_data = Arc::new(WalletDataProvider::new(
            connections.clone(),
            token_index,
            prices.clone(),
            clock,
            WalletDataConfig::default(),
        ));
        let transfers = TransferService::new(
            connections.clone(),
            TransferConfig {
                network_fee_lamports: config.network_fee_lamports,
                min_reserve_lamports: config.min_reserve_lamports,
                explorer_base_url: config.explorer_base_url.clone(),
            },
        );
        let swaps = SwapService::new(
            wallet_data.clone(),
            aggregator,
            prices.clone(),
            connections,
            SwapConfig {
                fee_reserve_sol: config.swap_fee_reserve_sol,
                settle_delay: Duration::from_millis(config.settle_delay_ms),
                explorer_base_url: config.explorer_base_url.clone(),
            },
        );

        Ok(Self::new(wallet_data, transfers, swaps, prices, meme))
    }

    /// Handle one chat message. Never fails: unexpected errors, panics
    /// included, become an apology.
    pub async fn process_request(&self, text: &str, wallet: Option<&dyn WalletSigner>) -> AssistantResponse {
        let Some(intent) = parse_intent(text.trim()) else {
            return AssistantResponse { message: HELP.to_string(), intent: None };
        };
        info!("Handling {} request", intent.name());

        let message = match AssertUnwindSafe(self.handle(&intent, wallet)).catch_unwind().await {
            Ok(Ok(message)) => message,
            Ok(Err(e)) => {
                error!("Failed to handle {} request: {:#}", intent.name(), e);
                APOLOGY.to_string()
            }
            Err(_) => {
                error!("Handler for {} request panicked", intent.name());
                APOLOGY.to_string()
            }
        };

        AssistantResponse { message, intent: Some(intent) }
    }

    async fn handle(&self, intent: &Intent, wallet: Option<&dyn WalletSigner>) -> Result<String> {
        let wallet = wallet.filter(|w| w.is_connected() && w.pubkey().is_some());
        let address = wallet.and_then(|w| w.pubkey()).map(|p| p.to_string());

        match intent {
            Intent::Greeting => Ok(GREETING.to_string()),
            Intent::Help => Ok(HELP.to_string()),
            Intent::Price { symbol: Some(symbol) } => Ok(self.spot_price_reply(symbol).await),
            Intent::Price { symbol: None } => Ok(self.market_overview_reply().await),
            Intent::Meme { address } => Ok(self.meme_reply(address).await),
            Intent::Swap { from_token, to_token, amount } => {
                let request = SwapRequest {
                    from_token: from_token.clone(),
                    to_token: to_token.clone(),
                    amount: amount.to_string(),
                };
                match wallet {
                    Some(wallet) => Ok(render_swap(&self.swaps.execute_swap(&request, wallet).await)),
                    None => Ok(self.swap_preview_reply(&request).await),
                }
            }
            _ => {
                let (Some(wallet), Some(address)) = (wallet, address) else {
                    return Ok(format!("Please connect your wallet so I can handle your {} request.", intent.name()));
                };
                match intent {
                    Intent::Balance => Ok(render_balance(&self.wallet_data.get_wallet_data(&address).await)),
                    Intent::History => {
                        let records = self
                            .wallet_data
                            .get_recent_transactions(&address, HISTORY_LIMIT)
                            .await
                            .context("loading transaction history")?;
                        Ok(render_history(&records))
                    }
                    Intent::Send { recipient, amount, token } => {
                        let request = TransferRequest {
                            recipient: recipient.clone(),
                            amount: *amount,
                            token: token.clone(),
                        };
                        Ok(render_transfer(&self.transfers.transfer(&request, wallet).await))
                    }
                    _ => Ok(HELP.to_string()),
                }
            }
        }
    }

    async fn spot_price_reply(&self, symbol: &str) -> String {
        match self.prices.get_spot_price(symbol).await {
            Ok(Some(quote)) => {
                let mut reply = format!("{} is trading at {}", quote.symbol, format_usd(Some(quote.price_usd)));
                if let Some(change) = quote.change_24h {
                    let _ = write!(reply, " ({} in 24h)", format_percent_change(change));
                }
                reply.push('.');
                reply
            }
            Ok(None) => format!("I couldn't find a price for {}.", symbol),
            Err(e) => {
                error!("Price lookup for {} failed: {}", symbol, e);
                format!("I couldn't reach the price service for {} right now. Please try again shortly.", symbol)
            }
        }
    }

    async fn market_overview_reply(&self) -> String {
        let (listings, metrics) =
            futures::join!(self.prices.get_listings(LISTING_LIMIT), self.prices.get_global_metrics());
        if let (Err(e), Err(_)) = (&listings, &metrics) {
            error!("Market overview unavailable: {}", e);
            return "Market data is unavailable right now. Please try again shortly.".to_string();
        }
        render_market(listings.as_deref().unwrap_or_default(), metrics.ok().as_ref())
    }

    async fn meme_reply(&self, address: &str) -> String {
        match self.meme.analyze(address).await {
            Ok(Some(analysis)) => render_meme(&analysis),
            Ok(None) => format!("I couldn't find any trading pairs for {} on Solana.", shorten_address(address)),
            Err(e) => {
                error!("Meme analysis for {} failed: {}", address, e);
                "Token analysis is unavailable right now. Please try again shortly.".to_string()
            }
        }
    }

    async fn swap_preview_reply(&self, request: &SwapRequest) -> String {
        match self.swaps.get_swap_estimate(request).await {
            Ok(estimate) => {
                let mut reply = format!(
                    "Swapping {} {} would get you about {} {}",
                    format_token_amount(estimate.from_amount, &estimate.from_token),
                    estimate.from_token,
                    format_token_amount(estimate.to_amount, &estimate.to_token),
                    estimate.to_token
                );
                if let Some(usd) = estimate.usd_value {
                    let _ = write!(reply, " ({})", format_usd(Some(usd)));
                }
                let _ = write!(reply, ", price impact {:.2}%.", estimate.price_impact * 100.0);
                if let Some(trend) = estimate.trend {
                    let _ = write!(reply, " {} is {} over 24h.", estimate.to_token, format_percent_change(trend));
                }
                reply.push_str(" Connect your wallet to execute the swap.");
                reply
            }
            Err(rejection) => format!("I can't prepare that swap: {}.", rejection.reason.trim_end_matches('.')),
        }
    }
}

/// Sent but not confirmed, or failed with a confirmation-channel error after
/// a signature was obtained
fn likely_succeeded(result: &OperationResult) -> bool {
    if result.is(ErrorKind::ConfirmationUnknown) {
        return true;
    }
    result.transaction_id.is_some()
        && !result.is(ErrorKind::BalanceVerificationFailed)
        && classify_upstream_error(&result.message).is_confirmation_ambiguous()
}

fn with_link(mut message: String, result: &OperationResult) -> String {
    if let Some(url) = &result.explorer_url {
        let _ = write!(message, "\nView transaction: {}", url);
    }
    message
}

pub fn render_transfer(result: &OperationResult) -> String {
    if result.success {
        return with_link(result.message.clone(), result);
    }
    if likely_succeeded(result) {
        return with_link(
            format!(
                "{} The network did not confirm it in time, but it has most likely gone through.",
                result.message
            ),
            result,
        );
    }
    match result.error_kind {
        Some(ErrorKind::UserRejected) => "Transfer cancelled: you rejected it in your wallet.".to_string(),
        Some(ErrorKind::NotImplemented) => result.message.clone(),
        Some(ErrorKind::InsufficientBalanceForRent) => result.message.clone(),
        _ => with_link(format!("Transfer failed: {}", result.message), result),
    }
}

pub fn render_swap(result: &OperationResult) -> String {
    if result.success {
        return with_link(result.message.clone(), result);
    }
    if likely_succeeded(result) {
        return with_link(
            format!(
                "{} The swap was submitted and is likely successful; check your balance in a moment.",
                result.message
            ),
            result,
        );
    }
    match result.error_kind {
        Some(ErrorKind::UserRejected) => "Swap cancelled: you rejected it in your wallet.".to_string(),
        Some(ErrorKind::BalanceVerificationFailed) => with_link(
            format!("{} Please check the transaction before retrying.", result.message),
            result,
        ),
        _ => with_link(format!("Swap failed: {}", result.message), result),
    }
}

pub fn render_balance(snapshot: &WalletSnapshot) -> String {
    let mut reply = format!("Wallet {}\n", shorten_address(&snapshot.address));
    if snapshot.degraded {
        reply.push_str("I couldn't reach the network, so these balances may be out of date or incomplete.\n");
    } else if snapshot.stale {
        let _ = writeln!(
            reply,
            "I couldn't refresh your balances; these are from {} and may be out of date.",
            snapshot.fetched_at.format("%H:%M:%S UTC")
        );
    }
    if !snapshot.degraded && !snapshot.tokens_complete {
        reply.push_str("Your token holdings couldn't be loaded, so only SOL is shown.\n");
    }
    for token in &snapshot.tokens {
        let _ = writeln!(
            reply,
            "- {} {} ({})",
            format_token_amount(token.balance, &token.symbol),
            token.symbol,
            format_usd(token.usd_value)
        );
    }
    let _ = write!(reply, "Total value: {}", format_usd(Some(snapshot.total_value_usd)));
    if snapshot.unpriced_count() > 0 {
        let _ = write!(reply, " (excluding {} unpriced token(s))", snapshot.unpriced_count());
    }
    reply
}

pub fn render_history(records: &[TransactionRecord]) -> String {
    if records.is_empty() {
        return "No recent transactions found for this wallet.".to_string();
    }
    let mut reply = String::from("Your recent transactions:");
    for record in records {
        let when = record
            .info
            .block_time
            .and_then(|t| chrono::DateTime::<chrono::Utc>::from_timestamp(t, 0))
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "pending".to_string());
        let status = if record.info.success { "ok" } else { "failed" };
        let _ = write!(reply, "\n- {} {} [{}]", shorten_address(&record.info.signature), when, status);
        if let Some(summary) = &record.summary {
            let change = summary.balance_change_lamports;
            let sign = if change >= 0 { "+" } else { "-" };
            let _ = write!(
                reply,
                " {}{} SOL (fee {} SOL)",
                sign,
                format_token_amount(lamports_to_sol(change.unsigned_abs()), "SOL"),
                format_token_amount(lamports_to_sol(summary.fee_lamports), "SOL")
            );
        }
    }
    reply
}

pub fn render_market(listings: &[CoinListing], metrics: Option<&GlobalMetrics>) -> String {
    let mut reply = String::from("Market overview");
    if let Some(metrics) = metrics {
        let _ = write!(
            reply,
            "\nTotal market cap: {}",
            format_compact_usd(metrics.total_market_cap_usd)
        );
        if let Some(change) = metrics.market_cap_change_24h {
            let _ = write!(reply, " ({})", format_percent_change(change));
        }
        let _ = write!(
            reply,
            "\n24h volume: {}, BTC dominance: {:.1}%",
            format_compact_usd(metrics.total_volume_usd),
            metrics.btc_dominance
        );
    }
    for (i, coin) in listings.iter().enumerate() {
        let rank = coin.rank.map(|r| r as usize).unwrap_or(i + 1);
        let _ = write!(reply, "\n{}. {} ({}) {}", rank, coin.name, coin.symbol, format_usd(Some(coin.price_usd)));
        if let Some(change) = coin.change_24h {
            let _ = write!(reply, " {}", format_percent_change(change));
        }
    }
    reply
}

pub fn render_meme(analysis: &MemeAnalysis) -> String {
    let market = &analysis.market;
    let mut reply = format!(
        "{} ({})\nPrice: {}\nLiquidity: {}\n24h volume: {}\n24h change: {}",
        market.name,
        market.symbol,
        format_usd(Some(market.price_usd)),
        format_compact_usd(market.liquidity_usd),
        format_compact_usd(market.volume_24h_usd),
        format_percent_change(market.price_change_24h)
    );
    if let Some(fdv) = market.fdv_usd {
        let _ = write!(reply, "\nFDV: {}", format_compact_usd(fdv));
    }
    for flag in &analysis.risk_flags {
        let _ = write!(reply, "\nRisk: {}", flag);
    }
    let _ = write!(
        reply,
        "\nHeuristic outlook: {} (confidence {}/100). This is a simple threshold heuristic on liquidity, \
         volume and 24h price change, not a prediction or financial advice.",
        analysis.prediction.as_str(),
        analysis.confidence
    );
    if let Some(url) = &market.pair_url {
        let _ = write!(reply, "\nChart: {}", url);
    }
    reply
}
