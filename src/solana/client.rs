use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::UiTransactionEncoding;
use std::time::Duration;

use crate::error::{RpcError, UpstreamErrorKind};
use crate::solana::rpc_helpers::{balance_change_for, parse_token_account};

/// Decoded SPL token account holding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenAccountBalance {
    pub mint: String,
    pub raw_amount: u64,
    pub ui_amount: f64,
    pub decimals: u8,
}

/// Result of a dry-run submission
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationOutcome {
    /// Chain-reported error, if the simulated execution failed
    pub err: Option<String>,
    pub logs: Vec<String>,
}

/// What the chain said about a broadcast transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Confirmed,
    /// Landed but execution failed; carries the chain error payload
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct SignatureQuery {
    pub limit: usize,
    pub before: Option<Signature>,
    pub until: Option<Signature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub success: bool,
    pub memo: Option<String>,
}

/// Condensed view of a confirmed transaction from one account's perspective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub signature: String,
    pub block_time: Option<i64>,
    pub success: bool,
    pub fee_lamports: u64,
    /// Native balance change of the queried account, fee included
    pub balance_change_lamports: i64,
}

/// The ledger RPC surface the assistant depends on
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Endpoint identifier, used for logging and health bookkeeping
    fn url(&self) -> &str;

    async fn get_balance(&self, account: &Pubkey) -> Result<u64, RpcError>;

    /// Latest blockhash and the last block height at which it is valid
    async fn get_latest_blockhash(&self) -> Result<(Hash, u64), RpcError>;

    async fn get_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<Vec<TokenAccountBalance>, RpcError>;

    async fn simulate_transaction(&self, tx: &VersionedTransaction) -> Result<SimulationOutcome, RpcError>;

    async fn send_raw_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, RpcError>;

    /// Poll until the signature is confirmed, fails on-chain, or the blockhash
    /// expires. Polling is bounded; running out of polls is an error.
    async fn confirm_transaction(
        &self,
        signature: &Signature,
        blockhash: &Hash,
        last_valid_block_height: u64,
    ) -> Result<ConfirmationStatus, RpcError>;

    async fn get_signatures_for_address(
        &self,
        account: &Pubkey,
        query: SignatureQuery,
    ) -> Result<Vec<SignatureInfo>, RpcError>;

    async fn get_transaction_summary(
        &self,
        signature: &Signature,
        account: &Pubkey,
    ) -> Result<TransactionSummary, RpcError>;
}

/// Bounds for confirmation polling
#[derive(Debug, Clone)]
pub struct ConfirmConfig {
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1_000),
            max_polls: 30,
        }
    }
}

/// [`LedgerRpc`] over the Solana nonblocking RPC client
pub struct SolanaClient {
    url: String,
    rpc_client: RpcClient,
    confirm_config: ConfirmConfig,
}

impl SolanaClient {
    /// Create a new Solana client with the given RPC URL
    pub fn new(rpc_url: &str) -> Self {
        Self::new_with_timeout(rpc_url, Duration::from_secs(5))
    }

    /// Create a client whose every request is bounded by `timeout`
    pub fn new_with_timeout(rpc_url: &str, timeout: Duration) -> Self {
        let commitment = CommitmentConfig::confirmed();
        let rpc_client = RpcClient::new_with_timeout_and_commitment(rpc_url.to_string(), timeout, commitment);

        Self {
            url: rpc_url.to_string(),
            rpc_client,
            confirm_config: ConfirmConfig::default(),
        }
    }

    pub fn with_confirm_config(mut self, confirm_config: ConfirmConfig) -> Self {
        self.confirm_config = confirm_config;
        self
    }
}

#[async_trait]
impl LedgerRpc for SolanaClient {
    fn url(&self) -> &str {
        &self.url
    }

    async fn get_balance(&self, account: &Pubkey) -> Result<u64, RpcError> {
        debug!("Getting balance of {} from {}", account, self.url);
        Ok(self.rpc_client.get_balance(account).await?)
    }

    async fn get_latest_blockhash(&self) -> Result<(Hash, u64), RpcError> {
        Ok(self
            .rpc_client
            .get_latest_blockhash_with_commitment(CommitmentConfig::confirmed())
            .await?)
    }

    async fn get_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<Vec<TokenAccountBalance>, RpcError> {
        let accounts = self
            .rpc_client
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::ProgramId(*program_id))
            .await?;

        let mut balances = Vec::with_capacity(accounts.len());
        for keyed in accounts {
            let data = serde_json::to_value(&keyed.account.data)
                .map_err(|e| RpcError::invalid_response(format!("token account {}: {}", keyed.pubkey, e)))?;
            match parse_token_account(&data) {
                Some(balance) => balances.push(balance),
                None => warn!("Skipping undecodable token account {}", keyed.pubkey),
            }
        }
        Ok(balances)
    }

    async fn simulate_transaction(&self, tx: &VersionedTransaction) -> Result<SimulationOutcome, RpcError> {
        let response = self.rpc_client.simulate_transaction(tx).await?;
        Ok(SimulationOutcome {
            err: response.value.err.map(|e| e.to_string()),
            logs: response.value.logs.unwrap_or_default(),
        })
    }

    async fn send_raw_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, RpcError> {
        Ok(self.rpc_client.send_transaction(tx).await?)
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        blockhash: &Hash,
        last_valid_block_height: u64,
    ) -> Result<ConfirmationStatus, RpcError> {
        for poll in 0..self.confirm_config.max_polls {
            let statuses = self.rpc_client.get_signature_statuses(&[*signature]).await?.value;
            if let Some(Some(status)) = statuses.into_iter().next() {
                if let Some(err) = status.err {
                    return Ok(ConfirmationStatus::Failed(err.to_string()));
                }
                if status.satisfies_commitment(CommitmentConfig::confirmed()) {
                    debug!("{} confirmed after {} polls", signature, poll + 1);
                    return Ok(ConfirmationStatus::Confirmed);
                }
            }

            let block_height = self.rpc_client.get_block_height().await?;
            if block_height > last_valid_block_height {
                return Err(RpcError::new(
                    UpstreamErrorKind::BlockhashExpired,
                    format!(
                        "Signature {} has expired: block height exceeded (blockhash {})",
                        signature, blockhash
                    ),
                ));
            }

            tokio::time::sleep(self.confirm_config.poll_interval).await;
        }

        Err(RpcError::new(
            UpstreamErrorKind::ConfirmationUnavailable,
            format!(
                "Transaction {} was not confirmed in {} polls",
                signature, self.confirm_config.max_polls
            ),
        ))
    }

    async fn get_signatures_for_address(
        &self,
        account: &Pubkey,
        query: SignatureQuery,
    ) -> Result<Vec<SignatureInfo>, RpcError> {
        let config = GetConfirmedSignaturesForAddress2Config {
            before: query.before,
            until: query.until,
            limit: Some(query.limit),
            commitment: Some(CommitmentConfig::confirmed()),
        };
        let statuses = self
            .rpc_client
            .get_signatures_for_address_with_config(account, config)
            .await?;

        Ok(statuses
            .into_iter()
            .map(|s| SignatureInfo {
                signature: s.signature,
                slot: s.slot,
                block_time: s.block_time,
                success: s.err.is_none(),
                memo: s.memo,
            })
            .collect())
    }

    async fn get_transaction_summary(
        &self,
        signature: &Signature,
        account: &Pubkey,
    ) -> Result<TransactionSummary, RpcError> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Base64),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };
        let confirmed = self.rpc_client.get_transaction_with_config(signature, config).await?;

        let meta = confirmed
            .transaction
            .meta
            .ok_or_else(|| RpcError::invalid_response(format!("transaction {} has no status meta", signature)))?;
        let keys = confirmed
            .transaction
            .transaction
            .decode()
            .map(|tx| tx.message.static_account_keys().to_vec())
            .unwrap_or_default();

        Ok(TransactionSummary {
            signature: signature.to_string(),
            block_time: confirmed.block_time,
            success: meta.err.is_none(),
            fee_lamports: meta.fee,
            balance_change_lamports: balance_change_for(account, &keys, &meta.pre_balances, &meta.post_balances),
        })
    }
}
