use serde::{Deserialize, Serialize};
use anyhow::{Context, Result};
use std::env;

/// Configuration for the wallet assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Solana RPC endpoints, in priority order
    pub rpc_urls: Vec<String>,
    /// Endpoint preferred for token-account enumeration
    pub token_rpc_url: Option<String>,
    /// Endpoints that must not be used for token-account enumeration
    pub unreliable_token_rpc_urls: Vec<String>,
    /// Helius DAS endpoint (with api key) for fast token holdings
    pub helius_das_url: Option<String>,
    /// Jupiter swap API base URL
    pub jupiter_base_url: String,
    /// Jupiter price API URL
    pub jupiter_price_url: String,
    /// CoinGecko API base URL
    pub coingecko_base_url: String,
    /// DexScreener API base URL
    pub dexscreener_base_url: String,
    /// Block explorer base URL used for transaction links
    pub explorer_base_url: String,
    /// Timeout applied to every outbound HTTP / RPC call
    pub http_timeout_secs: u64,
    /// Signature status polls before a confirmation is given up on
    pub confirm_max_polls: u32,
    /// Swap slippage tolerance in basis points
    pub slippage_bps: u16,
    /// Network fee assumed for a simple transfer
    pub network_fee_lamports: u64,
    /// Balance a native account must keep after a transfer
    pub min_reserve_lamports: u64,
    /// SOL held back for fees when swapping out of SOL
    pub swap_fee_reserve_sol: f64,
    /// Wait before re-reading balances after a swap
    pub settle_delay_ms: u64,
    /// Wallet keypair path
    pub keypair_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_urls: vec![
                "https://api.mainnet-beta.solana.com".to_string(),
                "https://solana-rpc.publicnode.com".to_string(),
            ],
            token_rpc_url: None,
            unreliable_token_rpc_urls: Vec::new(),
            helius_das_url: None,
            jupiter_base_url: "https://lite-api.jup.ag".to_string(),
            jupiter_price_url: "https://lite-api.jup.ag/price/v2".to_string(),
            coingecko_base_url: "https://api.coingecko.com/api/v3".to_string(),
            dexscreener_base_url: "https://api.dexscreener.com".to_string(),
            explorer_base_url: "https://solscan.io".to_string(),
            http_timeout_secs: 5,
            confirm_max_polls: 30,
            slippage_bps: 50,
            network_fee_lamports: 5_000,
            min_reserve_lamports: 1_000_000, // 0.001 SOL
            swap_fee_reserve_sol: 0.01,
            settle_delay_ms: 2_000,
            keypair_path: "wallet-keypair.json".to_string(),
        }
    }
}

fn split_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => {
            let parsed = value
                .trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {}: {}", name, value))?;
            Ok(Some(parsed))
        }
        Err(_) => Ok(None),
    }
}

/// Loads configuration from environment variables, falling back to default values
pub fn load_config() -> Result<Config> {
    let mut config = Config::default();

    if let Ok(urls) = env::var("RPC_URLS") {
        let urls = split_urls(&urls);
        if !urls.is_empty() {
            config.rpc_urls = urls;
        }
    }

    if let Ok(url) = env::var("TOKEN_RPC_URL") {
        config.token_rpc_url = Some(url);
    }

    if let Ok(urls) = env::var("UNRELIABLE_TOKEN_RPC_URLS") {
        config.unreliable_token_rpc_urls = split_urls(&urls);
    }

    if let Ok(url) = env::var("HELIUS_DAS_URL") {
        config.helius_das_url = Some(url);
    }

    if let Ok(url) = env::var("JUPITER_BASE_URL") {
        config.jupiter_base_url = url;
    }

    if let Ok(url) = env::var("JUPITER_PRICE_URL") {
        config.jupiter_price_url = url;
    }

    if let Ok(url) = env::var("COINGECKO_BASE_URL") {
        config.coingecko_base_url = url;
    }

    if let Ok(url) = env::var("DEXSCREENER_BASE_URL") {
        config.dexscreener_base_url = url;
    }

    if let Ok(url) = env::var("EXPLORER_BASE_URL") {
        config.explorer_base_url = url;
    }

    if let Some(value) = parse_var("HTTP_TIMEOUT_SECS")? {
        config.http_timeout_secs = value;
    }

    if let Some(value) = parse_var("CONFIRM_MAX_POLLS")? {
        config.confirm_max_polls = value;
    }

    if let Some(value) = parse_var("SLIPPAGE_BPS")? {
        config.slippage_bps = value;
    }

    if let Some(value) = parse_var("NETWORK_FEE_LAMPORTS")? {
        config.network_fee_lamports = value;
    }

    if let Some(value) = parse_var("MIN_RESERVE_LAMPORTS")? {
        config.min_reserve_lamports = value;
    }

    if let Some(value) = parse_var("SWAP_FEE_RESERVE_SOL")? {
        config.swap_fee_reserve_sol = value;
    }

    if let Some(value) = parse_var("SETTLE_DELAY_MS")? {
        config.settle_delay_ms = value;
    }

    if let Ok(keypair_path) = env::var("KEYPAIR_PATH") {
        config.keypair_path = keypair_path;
    }

    Ok(config)
}
