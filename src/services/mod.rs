pub mod swap;
pub mod transfer;
pub mod wallet_data;

pub use swap::{SwapConfig, SwapEstimate, SwapRejection, SwapService, ValidatedSwap};
pub use transfer::{TransferConfig, TransferService, TransferStage};
pub use wallet_data::{TransactionRecord, WalletDataConfig, WalletDataProvider};

use log::warn;

use crate::error::{is_insufficient_lamports, is_rent_violation, RpcError, SignerError, UpstreamErrorKind};
use crate::models::{ErrorKind, OperationResult};

/// Map a signer failure onto the user-facing result
pub(crate) fn signer_failure(err: SignerError) -> OperationResult {
    match err {
        SignerError::Rejected => {
            OperationResult::failure(ErrorKind::UserRejected, "You rejected the transaction in your wallet.")
        }
        SignerError::NotConnected => OperationResult::failure(ErrorKind::WalletNotConnected, "Please connect your wallet first."),
        SignerError::Failed(message) => {
            OperationResult::failure(ErrorKind::TransactionError, format!("Signing failed: {}", message))
        }
    }
}

/// Map a failed broadcast onto the user-facing result
pub(crate) fn broadcast_failure(err: RpcError) -> OperationResult {
    warn!("Broadcast failed ({:?}): {}", err.kind, err.message);
    if is_rent_violation(&err.message) {
        return OperationResult::failure(
            ErrorKind::InsufficientBalanceForRent,
            "The transaction would leave an account below its rent-exempt minimum.",
        );
    }
    if is_insufficient_lamports(&err.message) {
        return OperationResult::failure(ErrorKind::InsufficientBalance, "Insufficient SOL balance for this transaction.");
    }
    match err.kind {
        UpstreamErrorKind::RateLimited | UpstreamErrorKind::Network => OperationResult::failure(
            ErrorKind::NetworkError,
            format!("Could not reach the Solana network: {}", err.message),
        ),
        _ => OperationResult::failure(ErrorKind::TransactionError, format!("Transaction failed: {}", err.message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_is_not_an_execution_error() {
        assert!(signer_failure(SignerError::Rejected).is(ErrorKind::UserRejected));
        assert!(signer_failure(SignerError::Failed("ledger locked".into())).is(ErrorKind::TransactionError));
    }

    #[test]
    fn broadcast_errors_are_classified() {
        let rent = RpcError::from_message("Transaction results in an account (1) with insufficient funds for rent");
        assert!(broadcast_failure(rent).is(ErrorKind::InsufficientBalanceForRent));

        let network = RpcError::from_message("error sending request for url: connection refused");
        assert!(broadcast_failure(network).is(ErrorKind::NetworkError));

        let chain = RpcError::from_message("custom program error: 0x1");
        assert!(broadcast_failure(chain).is(ErrorKind::TransactionError));
    }
}
