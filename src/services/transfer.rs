use log::{info, warn};
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{is_insufficient_lamports, is_rent_violation};
use crate::models::token::token_by_symbol;
use crate::models::{ErrorKind, OperationResult, TransferRequest};
use crate::parsing::{canonicalize_address, AddressError};
use crate::services::{broadcast_failure, signer_failure};
use crate::solana::client::ConfirmationStatus;
use crate::solana::{build_sol_transfer, ConnectionManager, RequestKind, WalletSigner};
use crate::utils::{explorer_url, format_token_amount, lamports_to_sol, shorten_address, sol_to_lamports};

#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub network_fee_lamports: u64,
    /// Native balance the sender must keep after the transfer
    pub min_reserve_lamports: u64,
    pub explorer_base_url: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            network_fee_lamports: 5_000,
            min_reserve_lamports: 1_000_000,
            explorer_base_url: "https://solscan.io".to_string(),
        }
    }
}

/// Steps a transfer moves through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    Validating,
    Simulating,
    Signing,
    Broadcasting,
    ConfirmPending,
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validating => "validating",
            Self::Simulating => "simulating",
            Self::Signing => "signing",
            Self::Broadcasting => "broadcasting",
            Self::ConfirmPending => "awaiting confirmation",
        };
        f.write_str(name)
    }
}

/// Native SOL transfers: validate, simulate, sign, broadcast, confirm
pub struct TransferService {
    connections: Arc<ConnectionManager>,
    config: TransferConfig,
}

impl TransferService {
    pub fn new(connections: Arc<ConnectionManager>, config: TransferConfig) -> Self {
        Self { connections, config }
    }

    fn stage(&self, stage: TransferStage, request: &TransferRequest) {
        info!(
            "Transfer of {} {} to {}: {}",
            request.amount,
            request.token,
            shorten_address(&request.recipient),
            stage
        );
    }

    /// Rejection carrying the largest amount that keeps the reserve intact
    fn rent_shortfall(&self, balance: u64) -> OperationResult {
        let recommended = balance
            .saturating_sub(self.config.network_fee_lamports)
            .saturating_sub(self.config.min_reserve_lamports);
        let reserve = lamports_to_sol(self.config.min_reserve_lamports);
        OperationResult::failure(
            ErrorKind::InsufficientBalanceForRent,
            format!(
                "This transfer would leave less than {} SOL in your wallet, the minimum it must keep. \
                 You can send at most {} SOL.",
                format_token_amount(reserve, "SOL"),
                format_token_amount(lamports_to_sol(recommended), "SOL")
            ),
        )
        .with_details(json!({
            "recommendedAmount": lamports_to_sol(recommended),
            "minimumReserve": reserve,
            "balance": lamports_to_sol(balance),
        }))
    }

    pub async fn transfer(&self, request: &TransferRequest, signer: &dyn WalletSigner) -> OperationResult {
        self.stage(TransferStage::Validating, request);

        let sender = match signer.pubkey() {
            Some(pubkey) if signer.is_connected() => pubkey,
            _ => return OperationResult::failure(ErrorKind::WalletNotConnected, "Please connect your wallet first."),
        };

        if !request.amount.is_finite() || request.amount <= 0.0 {
            return OperationResult::failure(ErrorKind::InvalidAmount, "The amount must be greater than zero.");
        }

        let recipient = match canonicalize_address(&request.recipient) {
            Ok(address) => address,
            Err(AddressError::InvalidFormat) => {
                return OperationResult::failure(
                    ErrorKind::InvalidAddressFormat,
                    format!("'{}' is not a valid Solana address.", request.recipient),
                )
            }
            Err(AddressError::InvalidLength) => {
                return OperationResult::failure(
                    ErrorKind::InvalidRecipient,
                    format!("'{}' is not a valid recipient account.", request.recipient),
                )
            }
        };
        let recipient = match Pubkey::from_str(&recipient) {
            Ok(pubkey) => pubkey,
            Err(_) => {
                return OperationResult::failure(ErrorKind::InvalidRecipient, "The recipient address could not be decoded.")
            }
        };

        let Some(token) = token_by_symbol(&request.token) else {
            return OperationResult::failure(
                ErrorKind::UnsupportedToken,
                format!("{} is not a supported token.", request.token),
            );
        };

        let balance = match self
            .connections
            .make_request(RequestKind::Default, None, move |rpc| async move { rpc.get_balance(&sender).await })
            .await
        {
            Ok(lamports) => lamports,
            Err(e) => {
                return OperationResult::failure(
                    ErrorKind::NetworkError,
                    format!("Could not read your balance: {}", e),
                )
            }
        };

        let fee = self.config.network_fee_lamports;
        let reserve = self.config.min_reserve_lamports;

        if !token.is_native() {
            if balance < fee.saturating_add(reserve) {
                return OperationResult::failure(
                    ErrorKind::InsufficientBalance,
                    format!(
                        "You need at least {} SOL to pay the network fee for a {} transfer.",
                        format_token_amount(lamports_to_sol(fee + reserve), "SOL"),
                        token.symbol
                    ),
                );
            }
            return OperationResult::failure(
                ErrorKind::NotImplemented,
                format!("{} transfers are not supported yet. Only SOL can be sent.", token.symbol),
            );
        }

        let lamports = sol_to_lamports(request.amount);
        let required = lamports.saturating_add(fee);
        if required > balance {
            return OperationResult::failure(
                ErrorKind::InsufficientBalance,
                format!(
                    "Insufficient balance: you have {} SOL but need {} SOL including the network fee.",
                    format_token_amount(lamports_to_sol(balance), "SOL"),
                    format_token_amount(lamports_to_sol(required), "SOL")
                ),
            )
            .with_details(json!({
                "balance": lamports_to_sol(balance),
                "required": lamports_to_sol(required),
                "shortfall": lamports_to_sol(required - balance),
            }));
        }
        if balance - required < reserve {
            return self.rent_shortfall(balance);
        }

        self.stage(TransferStage::Simulating, request);
        let (blockhash, last_valid_block_height) = match self
            .connections
            .make_request(RequestKind::Default, None, |rpc| async move { rpc.get_latest_blockhash().await })
            .await
        {
            Ok(latest) => latest,
            Err(e) => {
                return OperationResult::failure(ErrorKind::NetworkError, format!("Could not fetch a recent blockhash: {}", e))
            }
        };

        let unsigned = build_sol_transfer(&sender, &recipient, lamports, blockhash);
        let unsigned_ref = &unsigned;
        match self
            .connections
            .make_request(RequestKind::Default, None, move |rpc| async move {
                rpc.simulate_transaction(unsigned_ref).await
            })
            .await
        {
            Ok(outcome) => {
                if let Some(err) = outcome.err {
                    let logs = outcome.logs.join("\n");
                    warn!("Transfer simulation failed: {} ({} log lines)", err, outcome.logs.len());
                    if is_rent_violation(&err) || is_rent_violation(&logs) {
                        return self.rent_shortfall(balance);
                    }
                    if is_insufficient_lamports(&logs) {
                        return OperationResult::failure(
                            ErrorKind::InsufficientBalance,
                            "Insufficient SOL balance for this transfer.",
                        );
                    }
                    return OperationResult::failure(ErrorKind::TransactionError, format!("Simulation failed: {}", err))
                        .with_details(json!({ "chainError": err, "logs": outcome.logs }));
                }
            }
            Err(e) => warn!("Simulation unavailable, continuing without it: {}", e),
        }

        self.stage(TransferStage::Signing, request);
        let signed = match signer.sign_transaction(unsigned).await {
            Ok(tx) => tx,
            Err(e) => return signer_failure(e),
        };

        self.stage(TransferStage::Broadcasting, request);
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
        let remaining = balance - required;
        let details = json!({
            "amount": request.amount,
            "token": token.symbol,
            "recipient": recipient.to_string(),
            "fee": lamports_to_sol(fee),
            "remainingBalance": lamports_to_sol(remaining),
        });

        self.stage(TransferStage::ConfirmPending, request);
        let connection = self.connections.get_connection(RequestKind::Default);
        match connection
            .client
            .confirm_transaction(&signature, &blockhash, last_valid_block_height)
            .await
        {
            Ok(ConfirmationStatus::Confirmed) => {
                info!("Transfer {} confirmed", sig);
                OperationResult::success(format!(
                    "Sent {} SOL to {}.",
                    format_token_amount(request.amount, "SOL"),
                    shorten_address(&recipient.to_string())
                ))
                .with_transaction(&sig, url)
                .with_details(details)
            }
            Ok(ConfirmationStatus::Failed(chain_error)) => {
                warn!("Transfer {} failed on-chain: {}", sig, chain_error);
                OperationResult::failure(ErrorKind::TransactionError, format!("Transaction failed on-chain: {}", chain_error))
                    .with_transaction(&sig, url)
                    .with_details(json!({ "chainError": chain_error }))
            }
            Err(e) => {
                warn!("Could not confirm transfer {} ({:?}): {}", sig, e.kind, e.message);
                let mut details = details;
                details["confirmationError"] = json!(e.message);
                OperationResult::failure(
                    ErrorKind::ConfirmationUnknown,
                    format!(
                        "Your transfer of {} SOL was sent but its confirmation could not be verified.",
                        format_token_amount(request.amount, "SOL")
                    ),
                )
                .with_transaction(&sig, url)
                .with_details(details)
            }
        }
    }
}
