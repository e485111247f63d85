pub mod client;
pub mod wallet;
pub mod connection;
pub mod rpc_helpers;

pub use client::{ConfirmConfig, LedgerRpc, SolanaClient};
pub use wallet::{KeypairSigner, WalletSigner};
pub use connection::{
    Connection, ConnectionManager, ConnectionManagerConfig, Endpoint, EndpointHealth, RequestKind, RetryPolicy,
};
pub use rpc_helpers::*;

use crate::cache::SystemClock;
use crate::config::Config;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

/// Create a Solana client from the application configuration
pub fn create_client_from_config(config: &Config, url: &str) -> SolanaClient {
    let confirm_config = ConfirmConfig { max_polls: config.confirm_max_polls, ..ConfirmConfig::default() };
    SolanaClient::new_with_timeout(url, Duration::from_secs(config.http_timeout_secs)).with_confirm_config(confirm_config)
}

/// Create the endpoint pool from the application configuration.
///
/// `TOKEN_RPC_URL` is added ahead of the general endpoints when it is not
/// already one of them.
pub fn create_connection_manager_from_config(config: &Config) -> Result<ConnectionManager> {
    let mut urls = config.rpc_urls.clone();
    if let Some(token_url) = &config.token_rpc_url {
        if !urls.contains(token_url) {
            urls.insert(0, token_url.clone());
        }
    }

    let endpoints = urls
        .iter()
        .map(|url| {
            let mut endpoint = Endpoint::new(Arc::new(create_client_from_config(config, url)));
            if config.token_rpc_url.as_deref() == Some(url.as_str()) {
                endpoint = endpoint.preferred_for_tokens();
            }
            if config.unreliable_token_rpc_urls.contains(url) {
                endpoint = endpoint.unreliable_for_tokens();
            }
            endpoint
        })
        .collect();

    ConnectionManager::new(endpoints, ConnectionManagerConfig::default(), Arc::new(SystemClock))
        .context("Failed to create RPC connection manager")
}

/// Load the signing keypair named in the configuration
pub fn create_signer_from_config(config: &Config) -> Result<KeypairSigner> {
    KeypairSigner::from_file(&config.keypair_path)
        .with_context(|| format!("Failed to load wallet from {}", config.keypair_path))
}
