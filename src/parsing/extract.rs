//! Pure extraction helpers shared by the intent classifier and the services.

use regex::Regex;
use solana_sdk::pubkey::Pubkey;
use std::sync::OnceLock;

use crate::models::token::KNOWN_TOKENS;

/// Why a recipient string could not be turned into an account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressError {
    /// Not base58 at all
    InvalidFormat,
    /// Decodes, but not to a 32-byte account key
    InvalidLength,
}

fn base58_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[1-9A-HJ-NP-Za-km-z]+").expect("base58 run pattern compiles"))
}

fn amount_token_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let mut symbols: Vec<&str> = KNOWN_TOKENS.iter().map(|t| t.symbol).collect();
        symbols.sort_by_key(|s| std::cmp::Reverse(s.len()));
        let pattern = format!(r"(?i)(-?\d+(?:\.\d+)?|-?\.\d+)\s*({})\b", symbols.join("|"));
        Regex::new(&pattern).expect("amount/token pattern compiles")
    })
}

/// Strictly decode a base58 account key and return it re-encoded.
pub fn canonicalize_address(candidate: &str) -> Result<String, AddressError> {
    let bytes = bs58::decode(candidate)
        .into_vec()
        .map_err(|_| AddressError::InvalidFormat)?;
    let key: [u8; 32] = bytes.try_into().map_err(|_| AddressError::InvalidLength)?;
    Ok(Pubkey::new_from_array(key).to_string())
}

/// First structurally valid account address embedded in `text`, canonicalized
pub fn detect_account_address(text: &str) -> Option<String> {
    base58_runs()
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|run| (32..=44).contains(&run.len()))
        .find_map(|run| canonicalize_address(run).ok())
}

/// Amount and upper-cased ticker of the first `<number> <TOKEN>` pair in `text`
pub fn extract_amount_and_token(text: &str) -> Option<(f64, String)> {
    let captures = amount_token_pattern().captures(text)?;
    let amount: f64 = captures.get(1)?.as_str().parse().ok()?;
    if !amount.is_finite() || amount <= 0.0 {
        return None;
    }
    let token = captures.get(2)?.as_str().to_uppercase();
    Some((amount, token))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

    #[test]
    fn finds_address_regardless_of_punctuation() {
        for text in [
            format!("send it to {ADDRESS}"),
            format!("({ADDRESS})"),
            format!("addr:{ADDRESS}, thanks!"),
            format!("\"{ADDRESS}\"."),
        ] {
            assert_eq!(detect_account_address(&text).as_deref(), Some(ADDRESS), "{text}");
        }
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let once = canonicalize_address(ADDRESS).unwrap();
        let twice = canonicalize_address(&once).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once, ADDRESS);
    }

    #[test]
    fn ignores_runs_that_are_not_keys() {
        assert_eq!(detect_account_address("no address here"), None);
        // 44 chars of '2' decode to more than 32 bytes
        let too_long = "2".repeat(44);
        assert_eq!(detect_account_address(&too_long), None);
        // glued to extra characters the run is longer than any key
        assert_eq!(detect_account_address(&format!("{ADDRESS}abcdef")), None);
    }

    #[test]
    fn first_valid_address_wins() {
        let other = "So11111111111111111111111111111111111111112";
        let text = format!("from {other} to {ADDRESS}");
        assert_eq!(detect_account_address(&text).as_deref(), Some(other));
    }

    #[test]
    fn rejects_bad_format_and_length() {
        assert_eq!(canonicalize_address("0OIl"), Err(AddressError::InvalidFormat));
        assert_eq!(canonicalize_address("abc"), Err(AddressError::InvalidLength));
    }

    #[test]
    fn extracts_amount_and_upper_cases_token() {
        assert_eq!(extract_amount_and_token("send 0.1 sol to x"), Some((0.1, "SOL".to_string())));
        assert_eq!(extract_amount_and_token("swap 25usdc"), Some((25.0, "USDC".to_string())));
        assert_eq!(extract_amount_and_token("1.5 Bonk please"), Some((1.5, "BONK".to_string())));
    }

    #[test]
    fn rejects_non_positive_or_unknown() {
        assert_eq!(extract_amount_and_token("send 0 SOL"), None);
        assert_eq!(extract_amount_and_token("send -1 SOL"), None);
        assert_eq!(extract_amount_and_token("send 5 DOGE"), None);
        assert_eq!(extract_amount_and_token("send 5 SOLANA"), None);
    }

    #[test]
    fn extraction_is_independent_of_address_position() {
        let text = format!("{ADDRESS} should get 2 SOL");
        assert_eq!(extract_amount_and_token(&text), Some((2.0, "SOL".to_string())));
        assert_eq!(detect_account_address(&text).as_deref(), Some(ADDRESS));
    }
}
