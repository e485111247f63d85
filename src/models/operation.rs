use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable failure codes reported in [`OperationResult::error_kind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidRecipient,
    InvalidAddressFormat,
    InvalidAmount,
    InsufficientBalance,
    InsufficientBalanceForRent,
    UnsupportedToken,
    SameToken,
    QuoteFailed,
    UserRejected,
    WalletNotConnected,
    TransactionError,
    ConfirmationUnknown,
    BalanceVerificationFailed,
    NetworkError,
    NotImplemented,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRecipient => "INVALID_RECIPIENT",
            Self::InvalidAddressFormat => "INVALID_ADDRESS_FORMAT",
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::InsufficientBalance => "INSUFFICIENT_BALANCE",
            Self::InsufficientBalanceForRent => "INSUFFICIENT_BALANCE_FOR_RENT",
            Self::UnsupportedToken => "UNSUPPORTED_TOKEN",
            Self::SameToken => "SAME_TOKEN",
            Self::QuoteFailed => "QUOTE_FAILED",
            Self::UserRejected => "USER_REJECTED",
            Self::WalletNotConnected => "WALLET_NOT_CONNECTED",
            Self::TransactionError => "TRANSACTION_ERROR",
            Self::ConfirmationUnknown => "CONFIRMATION_UNKNOWN",
            Self::BalanceVerificationFailed => "BALANCE_VERIFICATION_FAILED",
            Self::NetworkError => "NETWORK_ERROR",
            Self::NotImplemented => "NOT_IMPLEMENTED",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a transfer or swap, returned to the orchestrator as a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl OperationResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            transaction_id: None,
            explorer_url: None,
            error_kind: None,
            details: None,
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            transaction_id: None,
            explorer_url: None,
            error_kind: Some(kind),
            details: None,
        }
    }

    pub fn with_transaction(mut self, signature: impl Into<String>, explorer_url: impl Into<String>) -> Self {
        self.transaction_id = Some(signature.into());
        self.explorer_url = Some(explorer_url.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.error_kind == Some(kind)
    }

    /// Numeric field from `details`, if present
    pub fn detail_f64(&self, key: &str) -> Option<f64> {
        self.details.as_ref()?.get(key)?.as_f64()
    }

    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.as_ref()?.get(key)?.as_str()
    }
}

/// Validated native or token transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub recipient: String,
    pub amount: f64,
    pub token: String,
}

/// Swap between two supported tokens; `amount` is user text, parsed on validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub from_token: String,
    pub to_token: String,
    pub amount: String,
}
