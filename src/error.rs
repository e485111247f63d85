use serde::{Deserialize, Serialize};
use solana_client::client_error::ClientError;
use thiserror::Error;

/// Closed set of categories every upstream (RPC / HTTP) failure is mapped into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpstreamErrorKind {
    /// Provider throttled the request; another endpoint should be tried immediately
    RateLimited,
    /// Transport-level failure (unreachable host, reset, timeout)
    Network,
    /// Provider refuses or cannot serve confirmation / subscription calls
    ConfirmationUnavailable,
    /// Blockhash expired before confirmation was observed
    BlockhashExpired,
    /// Provider answered with something we could not decode
    InvalidResponse,
    Other,
}

impl UpstreamErrorKind {
    /// Whether a failed confirmation call of this kind says nothing about the
    /// on-chain outcome of an already broadcast transaction
    pub fn is_confirmation_ambiguous(self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Network | Self::ConfirmationUnavailable | Self::BlockhashExpired
        )
    }
}

/// Error returned by every ledger / market-data adapter
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RpcError {
    pub kind: UpstreamErrorKind,
    pub message: String,
}

impl RpcError {
    pub fn new(kind: UpstreamErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    /// Build an error from raw provider text, classifying it on the way
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self { kind: classify_upstream_error(&message), message }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::InvalidResponse, message)
    }
}

impl From<ClientError> for RpcError {
    fn from(err: ClientError) -> Self {
        Self::from_message(err.to_string())
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        if err.status().map(|s| s.as_u16()) == Some(429) {
            return Self::new(UpstreamErrorKind::RateLimited, err.to_string());
        }
        if err.is_timeout() || err.is_connect() {
            return Self::new(UpstreamErrorKind::Network, err.to_string());
        }
        if err.is_decode() {
            return Self::invalid_response(err.to_string());
        }
        Self::from_message(err.to_string())
    }
}

const RATE_LIMIT_MARKERS: &[&str] = &["429", "too many requests", "rate limit", "rate-limit"];

const BLOCKHASH_MARKERS: &[&str] = &[
    "block height exceeded",
    "blockheight exceeded",
    "blockhash not found",
    "transactionexpiredblockheightexceeded",
];

// Order matters: "confirmation timed out" must win over the generic network "timed out".
const CONFIRMATION_MARKERS: &[&str] = &[
    "was not confirmed in",
    "confirmation timed out",
    "method not found",
    "-32601",
    "not available on",
    "api key is not allowed",
    "403 forbidden",
    "signaturesubscribe",
    "websocket",
];

const NETWORK_MARKERS: &[&str] = &[
    "failed to fetch",
    "networkerror",
    "network error",
    "error sending request",
    "connection refused",
    "connection reset",
    "econnreset",
    "dns error",
    "timed out",
    "timeout",
    "502",
    "503",
    "504",
];

const INVALID_RESPONSE_MARKERS: &[&str] = &[
    "invalid type",
    "missing field",
    "expected value",
    "failed to deserialize",
    "invalid response",
];

/// Map raw provider error text into an [`UpstreamErrorKind`].
///
/// This is the only place in the crate that inspects error strings.
pub fn classify_upstream_error(message: &str) -> UpstreamErrorKind {
    let lower = message.to_lowercase();
    let contains_any = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    if contains_any(RATE_LIMIT_MARKERS) {
        UpstreamErrorKind::RateLimited
    } else if contains_any(BLOCKHASH_MARKERS) {
        UpstreamErrorKind::BlockhashExpired
    } else if contains_any(CONFIRMATION_MARKERS) {
        UpstreamErrorKind::ConfirmationUnavailable
    } else if contains_any(NETWORK_MARKERS) {
        UpstreamErrorKind::Network
    } else if contains_any(INVALID_RESPONSE_MARKERS) {
        UpstreamErrorKind::InvalidResponse
    } else {
        UpstreamErrorKind::Other
    }
}

/// Chain error / log text saying an account would be left below its rent-exempt minimum
pub fn is_rent_violation(payload: &str) -> bool {
    let lower = payload.to_lowercase();
    lower.contains("insufficient funds for rent") || lower.contains("insufficientfundsforrent")
}

/// System program log for a transfer larger than the source balance
pub fn is_insufficient_lamports(payload: &str) -> bool {
    payload.to_lowercase().contains("insufficient lamports")
}

/// Failures surfaced by a wallet signer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    #[error("user rejected the request")]
    Rejected,
    #[error("wallet not connected")]
    NotConnected,
    #[error("signing failed: {0}")]
    Failed(String),
}

impl SignerError {
    /// Wallet adapters report cancellation as free text; fold it into `Rejected`
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("user rejected") || lower.contains("rejected the request") || lower.contains("cancelled") {
            Self::Rejected
        } else {
            Self::Failed(message.to_string())
        }
    }
}
