//! In-memory fakes of every collaborator the services depend on.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::signer::keypair::Keypair;
use solana_sdk::transaction::VersionedTransaction;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sol_chat_assistant::cache::ManualClock;
use sol_chat_assistant::error::{RpcError, SignerError};
use sol_chat_assistant::market::{
    CoinListing, GlobalMetrics, IndexedToken, MemeAnalysis, MemeAnalyzer, PreparedSwap, PriceProvider, PriceQuote,
    SwapAggregator, SwapQuote, TokenIndex,
};
use sol_chat_assistant::models::token::token_by_symbol;
use sol_chat_assistant::services::{
    SwapConfig, SwapService, TransferConfig, TransferService, WalletDataConfig, WalletDataProvider,
};
use sol_chat_assistant::solana::client::{
    ConfirmationStatus, LedgerRpc, SignatureInfo, SignatureQuery, SimulationOutcome, TokenAccountBalance,
    TransactionSummary,
};
use sol_chat_assistant::solana::{
    build_sol_transfer, ConnectionManager, ConnectionManagerConfig, Endpoint, KeypairSigner, RetryPolicy,
    WalletSigner,
};
use sol_chat_assistant::Assistant;

pub const RECIPIENT: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

pub fn sol(amount: f64) -> u64 {
    (amount * 1_000_000_000.0).round() as u64
}

pub fn token_account(symbol: &str, ui_amount: f64) -> TokenAccountBalance {
    let token = token_by_symbol(symbol).expect("known token");
    TokenAccountBalance {
        mint: token.mint.to_string(),
        raw_amount: (ui_amount * 10f64.powi(token.decimals as i32)).round() as u64,
        ui_amount,
        decimals: token.decimals,
    }
}

/// Balances the ledger switches to once a transaction is broadcast
#[derive(Clone)]
pub struct LedgerState {
    pub lamports: u64,
    pub token_accounts: Vec<TokenAccountBalance>,
}

pub struct FakeLedger {
    url: String,
    blockhash: Hash,
    pub state: Mutex<LedgerState>,
    pub after_send: Mutex<Option<LedgerState>>,
    pub simulation: Mutex<SimulationOutcome>,
    pub confirmation: Mutex<Result<ConfirmationStatus, RpcError>>,
    pub send_error: Mutex<Option<RpcError>>,
    /// Every call fails with this error while set
    pub failure: Mutex<Option<RpcError>>,
    /// Token-account enumeration fails with this error while set
    pub token_failure: Mutex<Option<RpcError>>,
    /// Moved into `token_failure` when a transaction is broadcast
    pub token_failure_after_send: Mutex<Option<RpcError>>,
    pub signatures: Mutex<Vec<SignatureInfo>>,
    pub summaries: Mutex<HashMap<String, TransactionSummary>>,
    pub calls: AtomicUsize,
    pub send_calls: AtomicUsize,
    pub simulate_calls: AtomicUsize,
}

impl FakeLedger {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            blockhash: Hash::new_unique(),
            state: Mutex::new(LedgerState { lamports: 0, token_accounts: Vec::new() }),
            after_send: Mutex::new(None),
            simulation: Mutex::new(SimulationOutcome::default()),
            confirmation: Mutex::new(Ok(ConfirmationStatus::Confirmed)),
            send_error: Mutex::new(None),
            failure: Mutex::new(None),
            token_failure: Mutex::new(None),
            token_failure_after_send: Mutex::new(None),
            signatures: Mutex::new(Vec::new()),
            summaries: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
            simulate_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_lamports(self, lamports: u64) -> Self {
        self.state.lock().unwrap().lamports = lamports;
        self
    }

    pub fn set_lamports(&self, lamports: u64) {
        self.state.lock().unwrap().lamports = lamports;
    }

    pub fn set_token_accounts(&self, accounts: Vec<TokenAccountBalance>) {
        self.state.lock().unwrap().token_accounts = accounts;
    }

    pub fn set_after_send(&self, state: LedgerState) {
        *self.after_send.lock().unwrap() = Some(state);
    }

    pub fn set_confirmation(&self, result: Result<ConfirmationStatus, RpcError>) {
        *self.confirmation.lock().unwrap() = result;
    }

    pub fn fail_with(&self, error: Option<RpcError>) {
        *self.failure.lock().unwrap() = error;
    }

    pub fn fail_token_accounts(&self, error: Option<RpcError>) {
        *self.token_failure.lock().unwrap() = error;
    }

    pub fn send_count(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LedgerRpc for FakeLedger {
    fn url(&self) -> &str {
        &self.url
    }

    async fn get_balance(&self, _account: &Pubkey) -> Result<u64, RpcError> {
        self.enter()?;
        Ok(self.state.lock().unwrap().lamports)
    }

    async fn get_latest_blockhash(&self) -> Result<(Hash, u64), RpcError> {
        self.enter()?;
        Ok((self.blockhash, 1_000))
    }

    async fn get_token_accounts_by_owner(
        &self,
        _owner: &Pubkey,
        _program_id: &Pubkey,
    ) -> Result<Vec<TokenAccountBalance>, RpcError> {
        self.enter()?;
        if let Some(err) = self.token_failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.state.lock().unwrap().token_accounts.clone())
    }

    async fn simulate_transaction(&self, _tx: &VersionedTransaction) -> Result<SimulationOutcome, RpcError> {
        self.enter()?;
        self.simulate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.simulation.lock().unwrap().clone())
    }

    async fn send_raw_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, RpcError> {
        self.enter()?;
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.send_error.lock().unwrap().clone() {
            return Err(err);
        }
        if let Some(next) = self.after_send.lock().unwrap().take() {
            *self.state.lock().unwrap() = next;
        }
        if let Some(err) = self.token_failure_after_send.lock().unwrap().take() {
            *self.token_failure.lock().unwrap() = Some(err);
        }
        Ok(tx.signatures.first().copied().unwrap_or_default())
    }

    async fn confirm_transaction(
        &self,
        _signature: &Signature,
        _blockhash: &Hash,
        _last_valid_block_height: u64,
    ) -> Result<ConfirmationStatus, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.confirmation.lock().unwrap().clone()
    }

    async fn get_signatures_for_address(
        &self,
        _account: &Pubkey,
        query: SignatureQuery,
    ) -> Result<Vec<SignatureInfo>, RpcError> {
        self.enter()?;
        Ok(self.signatures.lock().unwrap().iter().take(query.limit).cloned().collect())
    }

    async fn get_transaction_summary(
        &self,
        signature: &Signature,
        _account: &Pubkey,
    ) -> Result<TransactionSummary, RpcError> {
        self.enter()?;
        self.summaries
            .lock()
            .unwrap()
            .get(&signature.to_string())
            .cloned()
            .ok_or_else(|| RpcError::invalid_response("transaction not found"))
    }
}

#[derive(Default)]
pub struct FakeTokenIndex {
    pub holdings: Mutex<Vec<IndexedToken>>,
}

#[async_trait]
impl TokenIndex for FakeTokenIndex {
    async fn get_holdings(&self, _owner: &Pubkey) -> Result<Vec<IndexedToken>, RpcError> {
        Ok(self.holdings.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct FakePrices {
    pub mint_prices: Mutex<HashMap<String, f64>>,
    pub spot: Mutex<HashMap<String, PriceQuote>>,
    pub listings: Mutex<Vec<CoinListing>>,
    pub unavailable: Mutex<bool>,
    pub panic_on_spot: Mutex<bool>,
}

impl FakePrices {
    pub fn set_mint_price(&self, symbol: &str, price: f64) {
        let mint = token_by_symbol(symbol).expect("known token").mint.to_string();
        self.mint_prices.lock().unwrap().insert(mint, price);
    }

    pub fn set_spot(&self, symbol: &str, price_usd: f64, change_24h: Option<f64>) {
        self.spot.lock().unwrap().insert(
            symbol.to_string(),
            PriceQuote { symbol: symbol.to_string(), price_usd, change_24h },
        );
    }

    fn check(&self) -> Result<(), RpcError> {
        if *self.unavailable.lock().unwrap() {
            return Err(RpcError::from_message("error sending request: connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl PriceProvider for FakePrices {
    async fn get_spot_price(&self, symbol: &str) -> Result<Option<PriceQuote>, RpcError> {
        if *self.panic_on_spot.lock().unwrap() {
            panic!("price provider exploded");
        }
        self.check()?;
        Ok(self.spot.lock().unwrap().get(&symbol.to_uppercase()).cloned())
    }

    async fn get_mint_price(&self, mint: &str) -> Result<Option<f64>, RpcError> {
        self.check()?;
        Ok(self.mint_prices.lock().unwrap().get(mint).copied())
    }

    async fn get_listings(&self, limit: usize) -> Result<Vec<CoinListing>, RpcError> {
        self.check()?;
        Ok(self.listings.lock().unwrap().iter().take(limit).cloned().collect())
    }

    async fn get_global_metrics(&self) -> Result<GlobalMetrics, RpcError> {
        self.check()?;
        Ok(GlobalMetrics {
            total_market_cap_usd: 2.4e12,
            total_volume_usd: 9.0e10,
            btc_dominance: 52.1,
            market_cap_change_24h: Some(1.5),
        })
    }
}

pub struct FakeAggregator {
    pub quote: Mutex<Result<SwapQuote, RpcError>>,
    pub quote_calls: AtomicUsize,
    pub prepare_calls: AtomicUsize,
}

impl FakeAggregator {
    pub fn new() -> Self {
        Self {
            quote: Mutex::new(Err(RpcError::invalid_response("no quote configured"))),
            quote_calls: AtomicUsize::new(0),
            prepare_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_quote(&self, from: &str, to: &str, in_amount: u64, out_amount: u64) {
        let from = token_by_symbol(from).expect("known token");
        let to = token_by_symbol(to).expect("known token");
        *self.quote.lock().unwrap() = Ok(SwapQuote {
            input_mint: from.mint.to_string(),
            output_mint: to.mint.to_string(),
            in_amount,
            out_amount,
            price_impact_pct: 0.001,
            raw: json!({ "inAmount": in_amount.to_string(), "outAmount": out_amount.to_string() }),
        });
    }

    pub fn quote_count(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SwapAggregator for FakeAggregator {
    async fn get_quote(&self, _input_mint: &str, _output_mint: &str, _amount: u64) -> Result<SwapQuote, RpcError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        self.quote.lock().unwrap().clone()
    }

    async fn prepare_transaction(&self, user: &Pubkey, _quote: &SwapQuote) -> Result<PreparedSwap, RpcError> {
        self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        Ok(PreparedSwap {
            transaction: build_sol_transfer(user, &Pubkey::new_unique(), 1, Hash::new_unique()),
            last_valid_block_height: 1_000,
        })
    }
}

pub struct FakeMeme {
    pub analysis: Option<MemeAnalysis>,
}

#[async_trait]
impl MemeAnalyzer for FakeMeme {
    async fn analyze(&self, _mint: &str) -> Result<Option<MemeAnalysis>, RpcError> {
        Ok(self.analysis.clone())
    }
}

/// Signer that always reports the user dismissing the popup
pub struct RejectingSigner {
    pubkey: Pubkey,
}

impl RejectingSigner {
    pub fn new() -> Self {
        Self { pubkey: Pubkey::new_unique() }
    }
}

#[async_trait]
impl WalletSigner for RejectingSigner {
    fn is_connected(&self) -> bool {
        true
    }

    fn pubkey(&self) -> Option<Pubkey> {
        Some(self.pubkey)
    }

    async fn sign_transaction(&self, _tx: VersionedTransaction) -> Result<VersionedTransaction, SignerError> {
        Err(SignerError::from_message("User rejected the request."))
    }
}

pub fn signer() -> KeypairSigner {
    KeypairSigner::new(Keypair::new())
}

/// Retry policy with no waiting
pub fn instant_retries() -> ConnectionManagerConfig {
    ConnectionManagerConfig {
        retry: RetryPolicy { max_attempts: 3, base_delay: Duration::ZERO, max_delay: Duration::ZERO },
        ..ConnectionManagerConfig::default()
    }
}

pub fn manager(ledgers: &[Arc<FakeLedger>], clock: Arc<ManualClock>) -> ConnectionManager {
    let endpoints = ledgers
        .iter()
        .map(|ledger| Endpoint::new(ledger.clone() as Arc<dyn LedgerRpc>))
        .collect();
    ConnectionManager::new(endpoints, instant_retries(), clock).expect("at least one endpoint")
}

/// All services wired over one fake ledger
pub struct Harness {
    pub ledger: Arc<FakeLedger>,
    pub clock: Arc<ManualClock>,
    pub connections: Arc<ConnectionManager>,
    pub token_index: Arc<FakeTokenIndex>,
    pub prices: Arc<FakePrices>,
    pub aggregator: Arc<FakeAggregator>,
    pub wallet_data: Arc<WalletDataProvider>,
}

impl Harness {
    pub fn new(lamports: u64) -> Self {
        let ledger = Arc::new(FakeLedger::new("https://rpc.test").with_lamports(lamports));
        let clock = Arc::new(ManualClock::new());
        let connections = Arc::new(manager(&[ledger.clone()], clock.clone()));
        let token_index = Arc::new(FakeTokenIndex::default());
        let prices = Arc::new(FakePrices::default());
        let aggregator = Arc::new(FakeAggregator::new());
        let wallet_data = Arc::new(WalletDataProvider::new(
            connections.clone(),
            token_index.clone(),
            prices.clone(),
            clock.clone(),
            WalletDataConfig { retry_delay: Duration::ZERO, ..WalletDataConfig::default() },
        ));

        Self { ledger, clock, connections, token_index, prices, aggregator, wallet_data }
    }

    pub fn transfer_service(&self) -> TransferService {
        TransferService::new(self.connections.clone(), TransferConfig::default())
    }

    pub fn swap_service(&self) -> SwapService {
        SwapService::new(
            self.wallet_data.clone(),
            self.aggregator.clone(),
            self.prices.clone(),
            self.connections.clone(),
            SwapConfig { settle_delay: Duration::ZERO, ..SwapConfig::default() },
        )
    }

    pub fn assistant(&self, meme: Option<MemeAnalysis>) -> Assistant {
        Assistant::new(
            self.wallet_data.clone(),
            self.transfer_service(),
            self.swap_service(),
            self.prices.clone(),
            Arc::new(FakeMeme { analysis: meme }),
        )
    }
}
