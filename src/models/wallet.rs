use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::token::NATIVE_SOL_MINT;

/// One holding of a wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub symbol: String,
    pub display_name: String,
    pub balance: f64,
    /// `None` when no price could be resolved, which is not the same as zero
    pub usd_value: Option<f64>,
    pub mint: String,
    pub decimals: u8,
    pub logo_uri: Option<String>,
}

impl TokenBalance {
    pub fn native(balance_sol: f64) -> Self {
        Self {
            symbol: "SOL".to_string(),
            display_name: "Solana".to_string(),
            balance: balance_sol,
            usd_value: None,
            mint: NATIVE_SOL_MINT.to_string(),
            decimals: 9,
            logo_uri: None,
        }
    }

    pub fn is_native(&self) -> bool {
        self.mint == NATIVE_SOL_MINT
    }
}

/// Point-in-time view of a wallet. Replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSnapshot {
    pub address: String,
    pub native_balance: f64,
    pub tokens: Vec<TokenBalance>,
    pub total_value_usd: f64,
    pub fetched_at: DateTime<Utc>,
    /// Set when the snapshot is a fallback rather than a successful fetch
    pub degraded: bool,
    /// Served from cache after every refresh attempt failed
    pub stale: bool,
    /// False when token holdings could not be read and only SOL is known
    pub tokens_complete: bool,
}

impl WalletSnapshot {
    /// Build a snapshot, deduplicating by mint and summing known USD values
    pub fn from_tokens(address: impl Into<String>, tokens: Vec<TokenBalance>) -> Self {
        let mut unique: Vec<TokenBalance> = Vec::with_capacity(tokens.len());
        for token in tokens {
            if !unique.iter().any(|t| t.mint == token.mint) {
                unique.push(token);
            }
        }

        let native_balance = unique
            .iter()
            .find(|t| t.is_native())
            .map(|t| t.balance)
            .unwrap_or(0.0);
        // fold from +0.0: an empty f64 sum is -0.0
        let total_value_usd = unique.iter().filter_map(|t| t.usd_value).fold(0.0, |acc, v| acc + v);

        Self {
            address: address.into(),
            native_balance,
            tokens: unique,
            total_value_usd,
            fetched_at: Utc::now(),
            degraded: false,
            stale: false,
            tokens_complete: true,
        }
    }

    /// Native-only zero snapshot returned when every fetch attempt failed
    pub fn degraded(address: impl Into<String>) -> Self {
        let mut snapshot = Self::from_tokens(address, vec![TokenBalance::native(0.0)]);
        snapshot.degraded = true;
        snapshot
    }

    /// Whether balances reflect a successful, complete, current fetch.
    /// Anything else must not be used as evidence that balances changed.
    pub fn is_reliable(&self) -> bool {
        !self.degraded && !self.stale && self.tokens_complete
    }

    pub fn balance_of_mint(&self, mint: &str) -> f64 {
        self.tokens
            .iter()
            .find(|t| t.mint == mint)
            .map(|t| t.balance)
            .unwrap_or(0.0)
    }

    pub fn token(&self, symbol: &str) -> Option<&TokenBalance> {
        self.tokens.iter().find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Number of holdings whose USD value is unknown
    pub fn unpriced_count(&self) -> usize {
        self.tokens.iter().filter(|t| t.usd_value.is_none()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(symbol: &str, mint: &str, balance: f64, usd: Option<f64>) -> TokenBalance {
        TokenBalance {
            symbol: symbol.to_string(),
            display_name: symbol.to_string(),
            balance,
            usd_value: usd,
            mint: mint.to_string(),
            decimals: 6,
            logo_uri: None,
        }
    }

    #[test]
    fn totals_ignore_unknown_valuations() {
        let mut sol = TokenBalance::native(2.0);
        sol.usd_value = Some(300.0);
        let snapshot = WalletSnapshot::from_tokens(
            "owner",
            vec![sol, token("USDC", "usdc-mint", 10.0, Some(10.0)), token("XYZ", "xyz", 5.0, None)],
        );

        assert_eq!(snapshot.total_value_usd, 310.0);
        assert_eq!(snapshot.native_balance, 2.0);
        assert_eq!(snapshot.unpriced_count(), 1);
    }

    #[test]
    fn keeps_first_entry_per_mint() {
        let snapshot = WalletSnapshot::from_tokens(
            "owner",
            vec![token("A", "m", 1.0, None), token("B", "m", 2.0, None)],
        );
        assert_eq!(snapshot.tokens.len(), 1);
        assert_eq!(snapshot.balance_of_mint("m"), 1.0);
    }

    #[test]
    fn degraded_snapshot_is_native_only() {
        let snapshot = WalletSnapshot::degraded("owner");
        assert!(snapshot.degraded);
        assert_eq!(snapshot.tokens.len(), 1);
        assert!(snapshot.tokens[0].is_native());
        assert_eq!(snapshot.total_value_usd, 0.0);
        assert!(snapshot.total_value_usd.is_sign_positive());
        assert!(!snapshot.is_reliable());
    }

    #[test]
    fn unpriced_wallet_totals_positive_zero() {
        let snapshot = WalletSnapshot::from_tokens("owner", vec![TokenBalance::native(1.0)]);
        assert!(snapshot.total_value_usd.is_sign_positive());
        assert!(snapshot.is_reliable());
    }
}
