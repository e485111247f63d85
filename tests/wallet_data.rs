mod common;

use common::{sol, token_account, Harness};
use sol_chat_assistant::error::{RpcError, UpstreamErrorKind};
use sol_chat_assistant::market::IndexedToken;
use sol_chat_assistant::models::token::token_by_symbol;
use sol_chat_assistant::solana::client::{SignatureInfo, TokenAccountBalance, TransactionSummary};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::time::Duration;

fn address() -> String {
    Pubkey::new_unique().to_string()
}

fn network_error() -> RpcError {
    RpcError::new(UpstreamErrorKind::Network, "error sending request: operation timed out")
}

#[tokio::test]
async fn serves_snapshot_from_cache_until_ttl() {
    let harness = Harness::new(sol(1.0));
    let wallet = address();

    let first = harness.wallet_data.get_wallet_data(&wallet).await;
    let calls = harness.ledger.call_count();
    harness.ledger.set_lamports(sol(2.0));

    let second = harness.wallet_data.get_wallet_data(&wallet).await;
    assert_eq!(harness.ledger.call_count(), calls);
    assert_eq!(second.native_balance, first.native_balance);

    harness.clock.advance(Duration::from_secs(6));
    let third = harness.wallet_data.get_wallet_data(&wallet).await;
    assert!(harness.ledger.call_count() > calls);
    assert_eq!(third.native_balance, 2.0);
}

#[tokio::test]
async fn refresh_bypasses_cache() {
    let harness = Harness::new(sol(1.0));
    let wallet = address();

    harness.wallet_data.get_wallet_data(&wallet).await;
    harness.ledger.set_lamports(sol(0.25));

    let refreshed = harness.wallet_data.refresh_wallet_data(&wallet).await;
    assert_eq!(refreshed.native_balance, 0.25);
}

#[tokio::test]
async fn returns_degraded_snapshot_when_ledger_is_down() {
    let harness = Harness::new(sol(1.0));
    harness.ledger.fail_with(Some(network_error()));

    let snapshot = harness.wallet_data.get_wallet_data(&address()).await;

    assert!(snapshot.degraded);
    assert_eq!(snapshot.native_balance, 0.0);
    assert_eq!(snapshot.tokens.len(), 1);
}

#[tokio::test]
async fn falls_back_to_stale_snapshot() {
    let harness = Harness::new(sol(1.5));
    let wallet = address();

    harness.wallet_data.get_wallet_data(&wallet).await;
    harness.clock.advance(Duration::from_secs(30));
    harness.ledger.fail_with(Some(network_error()));

    let snapshot = harness.wallet_data.get_wallet_data(&wallet).await;
    assert!(!snapshot.degraded);
    assert!(snapshot.stale);
    assert!(!snapshot.is_reliable());
    assert_eq!(snapshot.native_balance, 1.5);

    harness.ledger.fail_with(None);
    let recovered = harness.wallet_data.get_wallet_data(&wallet).await;
    assert!(!recovered.stale);
}

#[tokio::test]
async fn failed_token_enumeration_marks_holdings_incomplete() {
    let harness = Harness::new(sol(1.0));
    harness.ledger.set_token_accounts(vec![token_account("USDC", 10.0)]);
    harness.ledger.fail_token_accounts(Some(network_error()));

    let snapshot = harness.wallet_data.get_wallet_data(&address()).await;

    assert!(!snapshot.degraded);
    assert!(!snapshot.tokens_complete);
    assert!(!snapshot.is_reliable());
    assert_eq!(snapshot.native_balance, 1.0);
    assert_eq!(snapshot.tokens.len(), 1);
}

#[tokio::test]
async fn unknown_prices_stay_unknown() {
    let harness = Harness::new(sol(2.0));
    harness.ledger.set_token_accounts(vec![token_account("BONK", 1_000_000.0)]);
    harness.prices.set_mint_price("SOL", 150.0);

    let snapshot = harness.wallet_data.get_wallet_data(&address()).await;

    let sol_balance = snapshot.token("SOL").unwrap();
    assert_eq!(sol_balance.usd_value, Some(300.0));
    let bonk = snapshot.token("BONK").unwrap();
    assert_eq!(bonk.usd_value, None);
    assert_eq!(snapshot.unpriced_count(), 1);
    assert_eq!(snapshot.total_value_usd, 300.0);
}

#[tokio::test]
async fn price_outage_does_not_fail_the_snapshot() {
    let harness = Harness::new(sol(2.0));
    *harness.prices.unavailable.lock().unwrap() = true;

    let snapshot = harness.wallet_data.get_wallet_data(&address()).await;

    assert!(!snapshot.degraded);
    assert_eq!(snapshot.native_balance, 2.0);
    assert_eq!(snapshot.total_value_usd, 0.0);
}

#[tokio::test]
async fn enumerates_token_accounts_when_index_is_empty() {
    let harness = Harness::new(sol(1.0));
    let usdc = token_by_symbol("USDC").unwrap();
    harness.ledger.set_token_accounts(vec![
        token_account("USDC", 10.0),
        token_account("USDC", 5.5),
        TokenAccountBalance { mint: Pubkey::new_unique().to_string(), raw_amount: 7, ui_amount: 7.0, decimals: 0 },
        TokenAccountBalance { mint: Pubkey::new_unique().to_string(), raw_amount: 0, ui_amount: 0.0, decimals: 0 },
    ]);

    let snapshot = harness.wallet_data.get_wallet_data(&address()).await;

    assert!(snapshot.tokens_complete);
    assert_eq!(snapshot.tokens.len(), 3);
    assert_eq!(snapshot.balance_of_mint(usdc.mint), 15.5);
    assert!(snapshot.tokens.iter().any(|t| t.symbol == "Unknown" && t.balance == 7.0));
}

#[tokio::test]
async fn prefers_token_index_holdings() {
    let harness = Harness::new(sol(1.0));
    let jup = token_by_symbol("JUP").unwrap();
    harness.ledger.set_token_accounts(vec![token_account("USDC", 10.0)]);
    *harness.token_index.holdings.lock().unwrap() = vec![IndexedToken {
        mint: jup.mint.to_string(),
        symbol: None,
        name: None,
        logo_uri: Some("https://static.jup.ag/jup/icon.png".to_string()),
        balance: 40.0,
        decimals: 6,
        usd_value: Some(36.0),
    }];

    let snapshot = harness.wallet_data.get_wallet_data(&address()).await;

    assert_eq!(snapshot.tokens.len(), 2);
    let held = snapshot.token("JUP").unwrap();
    assert_eq!(held.usd_value, Some(36.0));
    assert_eq!(held.display_name, "Jupiter");
    assert!(snapshot.token("USDC").is_none());
}

#[tokio::test]
async fn recent_transactions_are_cached() {
    let harness = Harness::new(sol(1.0));
    let wallet = address();
    let signature = Signature::new_unique().to_string();
    harness.ledger.signatures.lock().unwrap().push(SignatureInfo {
        signature: signature.clone(),
        slot: 250_000_000,
        block_time: Some(1_700_000_000),
        success: true,
        memo: None,
    });
    harness.ledger.summaries.lock().unwrap().insert(
        signature.clone(),
        TransactionSummary {
            signature: signature.clone(),
            block_time: Some(1_700_000_000),
            success: true,
            fee_lamports: 5_000,
            balance_change_lamports: -100_005_000,
        },
    );

    let records = harness.wallet_data.get_recent_transactions(&wallet, 5).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].summary.as_ref().unwrap().balance_change_lamports, -100_005_000);

    let calls = harness.ledger.call_count();
    harness.wallet_data.get_recent_transactions(&wallet, 5).await.unwrap();
    assert_eq!(harness.ledger.call_count(), calls);
}

#[tokio::test]
async fn missing_transaction_leaves_summary_empty() {
    let harness = Harness::new(sol(1.0));
    harness.ledger.signatures.lock().unwrap().push(SignatureInfo {
        signature: Signature::new_unique().to_string(),
        slot: 1,
        block_time: None,
        success: false,
        memo: None,
    });

    let records = harness.wallet_data.get_recent_transactions(&address(), 5).await.unwrap();

    assert_eq!(records.len(), 1);
    assert!(records[0].summary.is_none());
}
