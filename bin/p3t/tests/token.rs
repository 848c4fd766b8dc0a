//! Live tests against the deployed P3T token.
//!
//! These tests need network access and read `tests/test-config.toml`.
//! Transfer tests also need a funded key, see `setup::load_private_key`.
//!
//! Run with:
//! ```bash
//! cargo test --package p3t --test token -- --ignored
//! ```

#[path = "setup.rs"]
mod setup;

use alloy_primitives::{Address, U256};
use balance::{format_units, SyncState};
use binding::TransferFilter;
use client::Wallet;
use p3t::{erc20_binder, TokenApp, TransferForm};
use setup::{load_test_config, setup_token, setup_wallet};
use std::time::Duration;

#[tokio::test]
#[ignore = "requires network access"]
async fn test_token_metadata() {
    let config = load_test_config();
    let token = setup_token(&config);

    println!("Token: {}", token.address());

    let decimals = token.decimals().await.expect("Failed to read decimals");
    let supply = token.total_supply().await.expect("Failed to read totalSupply");

    println!("✓ decimals: {decimals}");
    println!("✓ totalSupply: {}", format_units(supply, decimals));

    assert!(supply > U256::ZERO);
}

#[tokio::test]
#[ignore = "requires network access"]
async fn test_balance_of_zero_address() {
    let config = load_test_config();
    let token = setup_token(&config);

    let balance = token
        .balance_of(Address::ZERO)
        .await
        .expect("Failed to read balanceOf");

    assert_eq!(balance, U256::ZERO);
}

#[tokio::test]
#[ignore = "requires network access"]
async fn test_subscription_lifecycle() {
    let config = load_test_config();
    let token = setup_token(&config);

    let subscription = token
        .subscribe(TransferFilter::any(), |event| println!("{event:?}"))
        .await
        .expect("Failed to subscribe");
    assert_eq!(token.listener_count(), 1);

    drop(subscription);
    assert_eq!(token.listener_count(), 0);
}

#[tokio::test]
#[ignore = "requires network access and a funded PRIVATE_KEY"]
async fn test_self_transfer_syncs_balance() {
    let config = load_test_config();
    let wallet = Wallet::Local(setup_wallet());
    let network = config.network_config();

    let bind = erc20_binder(config.rpc_url.clone(), network.token, config.poll_interval());
    let mut app = TokenApp::new(Some(wallet), bind);
    let mut snapshots = app.watch_balance();

    let account = app.connect().await.expect("Failed to connect");
    let snapshot = tokio::time::timeout(
        Duration::from_secs(60),
        snapshots.wait_for(|s| s.state != SyncState::Loading),
    )
    .await
    .expect("Timed out loading balance")
    .expect("Synchronizer dropped")
    .clone();
    assert_eq!(snapshot.state, SyncState::Synced);

    let before = app.balance_display();
    println!("Balance of {account}: {before}");

    let gas = app
        .estimate_transfer(account, "0")
        .await
        .expect("Failed to estimate gas");
    println!("✓ Estimated gas: {gas}");
    assert!(gas > 21_000);

    // A self transfer of zero moves nothing but still emits `Transfer`.
    let mut form = TransferForm::new(account.to_string(), "0");
    let receipt = form
        .submit(&app)
        .await
        .expect("Transfer failed")
        .expect("Form was incomplete");

    println!("✓ Transfer included: {}", receipt.tx_hash);
    assert_eq!(form, TransferForm::default());
    assert_eq!(app.balance_display(), before);

    app.disconnect();
}
