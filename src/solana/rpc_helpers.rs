use serde_json::Value;
use solana_sdk::hash::Hash;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_instruction;
use solana_sdk::transaction::{Transaction, VersionedTransaction};

use crate::solana::client::TokenAccountBalance;

/// Decode a `jsonParsed` SPL token account payload
pub fn parse_token_account(data: &Value) -> Option<TokenAccountBalance> {
    let info = data.get("parsed")?.get("info")?;
    let token_amount = info.get("tokenAmount")?;

    let mint = info.get("mint")?.as_str()?.to_string();
    let raw_amount = token_amount.get("amount")?.as_str()?.parse::<u64>().ok()?;
    let decimals = u8::try_from(token_amount.get("decimals")?.as_u64()?).ok()?;
    let ui_amount = token_amount
        .get("uiAmount")
        .and_then(Value::as_f64)
        .unwrap_or_else(|| raw_amount as f64 / 10f64.powi(decimals as i32));

    Some(TokenAccountBalance { mint, raw_amount, ui_amount, decimals })
}

/// Native balance change of `account` between pre and post balances
pub fn balance_change_for(account: &Pubkey, keys: &[Pubkey], pre: &[u64], post: &[u64]) -> i64 {
    keys.iter()
        .position(|k| k == account)
        .and_then(|i| Some(*post.get(i)? as i64 - *pre.get(i)? as i64))
        .unwrap_or(0)
}

/// Unsigned single-instruction SOL transfer, ready for simulation and signing
pub fn build_sol_transfer(from: &Pubkey, to: &Pubkey, lamports: u64, blockhash: Hash) -> VersionedTransaction {
    let instruction = system_instruction::transfer(from, to, lamports);
    let message = Message::new_with_blockhash(&[instruction], Some(from), &blockhash);
    VersionedTransaction::from(Transaction::new_unsigned(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_json_parsed_token_account() {
        let data = json!({
            "program": "spl-token",
            "parsed": {
                "type": "account",
                "info": {
                    "mint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
                    "owner": "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU",
                    "tokenAmount": { "amount": "2500000", "decimals": 6, "uiAmount": 2.5, "uiAmountString": "2.5" }
                }
            },
            "space": 165
        });

        let parsed = parse_token_account(&data).expect("token account parses");
        assert_eq!(parsed.raw_amount, 2_500_000);
        assert_eq!(parsed.decimals, 6);
        assert_eq!(parsed.ui_amount, 2.5);
    }

    #[test]
    fn rejects_binary_payloads() {
        assert!(parse_token_account(&json!(["AAAA", "base64"])).is_none());
    }

    #[test]
    fn computes_balance_change_for_signer() {
        let owner = Pubkey::new_unique();
        let other = Pubkey::new_unique();
        let change = balance_change_for(&owner, &[owner, other], &[1_000, 0], &[400, 595]);
        assert_eq!(change, -600);
        assert_eq!(balance_change_for(&Pubkey::new_unique(), &[owner], &[1], &[2]), 0);
    }

    #[test]
    fn builds_transfer_with_payer_first() {
        let from = Pubkey::new_unique();
        let to = Pubkey::new_unique();
        let tx = build_sol_transfer(&from, &to, 42, Hash::default());
        assert_eq!(tx.message.static_account_keys()[0], from);
        assert_eq!(tx.signatures.len(), 1);
    }
}
