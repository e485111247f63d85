use futures::future::join_all;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::cache::{Clock, TtlCache};
use crate::error::{RpcError, UpstreamErrorKind};
use crate::market::{IndexedToken, PriceProvider, TokenIndex};
use crate::models::token::{token_by_mint, TOKEN_PROGRAM_ID};
use crate::models::{TokenBalance, WalletSnapshot};
use crate::solana::client::{SignatureInfo, SignatureQuery, TransactionSummary};
use crate::solana::{ConnectionManager, RequestKind};
use crate::utils::lamports_to_sol;

#[derive(Debug, Clone)]
pub struct WalletDataConfig {
    pub cache_ttl: Duration,
    pub max_retries: u32,
    /// Delay before retry `n` is `retry_delay * n`
    pub retry_delay: Duration,
}

impl Default for WalletDataConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(5),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// A signature from the account's history with its decoded summary, when
/// the transaction could be fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub info: SignatureInfo,
    pub summary: Option<TransactionSummary>,
}

/// Balances and valuations for a wallet, cached per address
pub struct WalletDataProvider {
    connections: Arc<ConnectionManager>,
    token_index: Arc<dyn TokenIndex>,
    prices: Arc<dyn PriceProvider>,
    cache: Mutex<TtlCache<String, WalletSnapshot>>,
    clock: Arc<dyn Clock>,
    config: WalletDataConfig,
}

impl WalletDataProvider {
    pub fn new(
        connections: Arc<ConnectionManager>,
        token_index: Arc<dyn TokenIndex>,
        prices: Arc<dyn PriceProvider>,
        clock: Arc<dyn Clock>,
        config: WalletDataConfig,
    ) -> Self {
        Self {
            connections,
            token_index,
            prices,
            cache: Mutex::new(TtlCache::new(config.cache_ttl)),
            clock,
            config,
        }
    }

    /// Snapshot for `address`, never failing.
    ///
    /// Served from cache while fresh. Otherwise the fetch is retried with
    /// linear backoff; after the last failure the cached snapshot is returned
    /// marked `stale` if one exists, else a zero native-only snapshot marked
    /// `degraded`.
    pub async fn get_wallet_data(&self, address: &str) -> WalletSnapshot {
        {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(snapshot) = cache.get_fresh(address, self.clock.now()) {
                debug!("Wallet data for {} served from cache", address);
                return snapshot;
            }
        }

        let attempts = self.config.max_retries.max(1);
        for attempt in 1..=attempts {
            match self.fetch_snapshot(address).await {
                Ok(snapshot) => {
                    let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
                    cache.insert(address.to_string(), snapshot.clone(), self.clock.now());
                    return snapshot;
                }
                Err(e) => {
                    warn!("Wallet data fetch for {} failed (attempt {}/{}): {}", address, attempt, attempts, e);
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_delay * attempt).await;
                    }
                }
            }
        }

        let stale = self.cache.lock().unwrap_or_else(PoisonError::into_inner).get_stale(address);
        match stale {
            Some(mut snapshot) => {
                warn!("Serving stale wallet data for {} fetched at {}", address, snapshot.fetched_at);
                snapshot.stale = true;
                snapshot
            }
            None => {
                warn!("Wallet data for {} unavailable, returning degraded snapshot", address);
                WalletSnapshot::degraded(address)
            }
        }
    }

    /// Drop the cached snapshot and fetch again
    pub async fn refresh_wallet_data(&self, address: &str) -> WalletSnapshot {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).invalidate(address);
        self.get_wallet_data(address).await
    }

    async fn fetch_snapshot(&self, address: &str) -> Result<WalletSnapshot, RpcError> {
        let (tokens, complete) = self.load_tokens(address).await?;
        let mut snapshot = WalletSnapshot::from_tokens(address, tokens);
        snapshot.tokens_complete = complete;
        if !complete {
            warn!("Token holdings for {} could not be read, snapshot is native-only", address);
        }
        info!(
            "Fetched wallet {}: {} SOL, {} tokens, ${:.2}",
            address,
            snapshot.native_balance,
            snapshot.tokens.len(),
            snapshot.total_value_usd
        );
        Ok(snapshot)
    }

    /// Native balance first, then fungible holdings with USD values where
    /// a price is known.
    ///
    /// Only a failure to read the native balance is an error. Holdings come
    /// from the token index, or from token-account enumeration when the index
    /// has nothing; either source failing just yields fewer tokens.
    pub async fn get_tokens(&self, address: &str) -> Result<Vec<TokenBalance>, RpcError> {
        self.load_tokens(address).await.map(|(tokens, _)| tokens)
    }

    /// Like [`Self::get_tokens`], also reporting whether fungible holdings
    /// were actually resolved
    async fn load_tokens(&self, address: &str) -> Result<(Vec<TokenBalance>, bool), RpcError> {
        let owner = Pubkey::from_str(address)
            .map_err(|e| RpcError::new(UpstreamErrorKind::Other, format!("invalid wallet address {}: {}", address, e)))?;

        let lamports = self
            .connections
            .make_request(RequestKind::Default, None, move |rpc| async move { rpc.get_balance(&owner).await })
            .await?;

        let mut tokens = vec![TokenBalance::native(lamports_to_sol(lamports))];

        let indexed = match self.token_index.get_holdings(&owner).await {
            Ok(holdings) => holdings,
            Err(e) => {
                warn!("Token index lookup for {} failed: {}", address, e);
                Vec::new()
            }
        };

        let complete = if indexed.is_empty() {
            match self.enumerate_token_accounts(&owner).await {
                Some(enumerated) => {
                    tokens.extend(enumerated);
                    true
                }
                None => false,
            }
        } else {
            tokens.extend(indexed.into_iter().filter(|t| t.balance > 0.0).map(indexed_to_balance));
            true
        };

        self.fill_usd_values(&mut tokens).await;
        Ok((tokens, complete))
    }

    /// `None` when the accounts could not be read
    async fn enumerate_token_accounts(&self, owner: &Pubkey) -> Option<Vec<TokenBalance>> {
        let owner = *owner;
        let program_id = Pubkey::from_str(TOKEN_PROGRAM_ID).ok()?;

        let accounts = match self
            .connections
            .make_request(RequestKind::Token, None, move |rpc| async move {
                rpc.get_token_accounts_by_owner(&owner, &program_id).await
            })
            .await
        {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!("Token account enumeration for {} failed: {}", owner, e);
                return None;
            }
        };

        let mut balances: Vec<TokenBalance> = Vec::new();
        for account in accounts.into_iter().filter(|a| a.raw_amount > 0) {
            if let Some(existing) = balances.iter_mut().find(|b| b.mint == account.mint) {
                existing.balance += account.ui_amount;
                continue;
            }
            let known = token_by_mint(&account.mint);
            balances.push(TokenBalance {
                symbol: known.map(|t| t.symbol.to_string()).unwrap_or_else(|| "Unknown".to_string()),
                display_name: known.map(|t| t.name.to_string()).unwrap_or_else(|| "Unknown".to_string()),
                balance: account.ui_amount,
                usd_value: None,
                mint: account.mint,
                decimals: account.decimals,
                logo_uri: None,
            });
        }
        Some(balances)
    }

    /// Price every token lacking a USD value, concurrently. Individual
    /// failures leave the value unknown.
    async fn fill_usd_values(&self, tokens: &mut [TokenBalance]) {
        let lookups = tokens.iter().map(|token| {
            let mint = token.mint.clone();
            let needed = token.usd_value.is_none();
            async move {
                if !needed {
                    return None;
                }
                match self.prices.get_mint_price(&mint).await {
                    Ok(price) => price,
                    Err(e) => {
                        debug!("No price for {}: {}", mint, e);
                        None
                    }
                }
            }
        });

        let prices = join_all(lookups).await;
        for (token, price) in tokens.iter_mut().zip(prices) {
            if let Some(price) = price {
                token.usd_value = Some(token.balance * price);
            }
        }
    }

    /// Most recent transactions touching `address`.
    ///
    /// Signature lists and transaction summaries go through the connection
    /// cache. Summaries that cannot be fetched are left empty.
    pub async fn get_recent_transactions(&self, address: &str, limit: usize) -> Result<Vec<TransactionRecord>, RpcError> {
        let owner = Pubkey::from_str(address)
            .map_err(|e| RpcError::new(UpstreamErrorKind::Other, format!("invalid wallet address {}: {}", address, e)))?;

        let cache_key = format!("signatures:{}:{}", address, limit);
        let signatures = self
            .connections
            .make_request(RequestKind::Default, Some(&cache_key), move |rpc| async move {
                let query = SignatureQuery { limit, ..SignatureQuery::default() };
                rpc.get_signatures_for_address(&owner, query).await
            })
            .await?;

        let summaries = signatures.iter().map(|info| {
            let signature = Signature::from_str(&info.signature).ok();
            let cache_key = format!("tx:{}:{}", info.signature, address);
            async move {
                let signature = signature?;
                self.connections
                    .make_request(RequestKind::Default, Some(&cache_key), move |rpc| async move {
                        rpc.get_transaction_summary(&signature, &owner).await
                    })
                    .await
                    .map_err(|e| warn!("Could not load transaction {}: {}", signature, e))
                    .ok()
            }
        });
        let summaries = join_all(summaries).await;

        Ok(signatures
            .into_iter()
            .zip(summaries)
            .map(|(info, summary)| TransactionRecord { info, summary })
            .collect())
    }
}

fn indexed_to_balance(token: IndexedToken) -> TokenBalance {
    let known = token_by_mint(&token.mint);
    let symbol = token
        .symbol
        .or_else(|| known.map(|t| t.symbol.to_string()))
        .unwrap_or_else(|| "Unknown".to_string());
    let display_name = token
        .name
        .or_else(|| known.map(|t| t.name.to_string()))
        .unwrap_or_else(|| symbol.clone());

    TokenBalance {
        symbol,
        display_name,
        balance: token.balance,
        usd_value: token.usd_value,
        mint: token.mint,
        decimals: token.decimals,
        logo_uri: token.logo_uri,
    }
}
