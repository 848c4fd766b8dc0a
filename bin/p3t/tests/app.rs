//! Wallet session flows against the in-memory token.

use alloy_primitives::{address, Address, U256};
use balance::{parse_units, SyncSnapshot, SyncState};
use binding::{MemoryToken, Token};
use client::{ClientError, StaticWallet, WalletProvider};
use p3t::{Notice, TokenApp, TransferForm};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::watch;

const DEPLOYER: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
const ALICE: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
const BOB: Address = address!("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");

type Binder<W> = Box<dyn Fn(&W, Address) -> Result<MemoryToken, ClientError> + Send + Sync>;

fn deploy() -> MemoryToken {
    MemoryToken::deploy(DEPLOYER, parse_units("1000000", 18).unwrap(), 18)
}

fn binder<W: 'static>(token: &MemoryToken) -> Binder<W> {
    let token = token.clone();
    Box::new(move |_: &W, account: Address| Ok(token.connect(account)))
}

fn app_for(
    token: &MemoryToken,
    account: Address,
) -> TokenApp<StaticWallet, MemoryToken, Binder<StaticWallet>> {
    TokenApp::new(Some(StaticWallet::single(account)), binder(token))
}

async fn wait_for(
    rx: &mut watch::Receiver<SyncSnapshot>,
    condition: impl FnMut(&SyncSnapshot) -> bool,
) -> SyncSnapshot {
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(condition))
        .await
        .expect("timed out waiting for balance")
        .expect("synchronizer dropped")
        .clone()
}

async fn connected(
    token: &MemoryToken,
    account: Address,
) -> TokenApp<StaticWallet, MemoryToken, Binder<StaticWallet>> {
    let mut app = app_for(token, account);
    let mut rx = app.watch_balance();

    assert_eq!(app.connect().await.unwrap(), account);
    wait_for(&mut rx, |s| s.state == SyncState::Synced).await;

    app
}

#[derive(Clone)]
struct DecliningWallet;

impl WalletProvider for DecliningWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ClientError> {
        Err(ClientError::from_rpc_error(4001, "User rejected the request."))
    }
}

/// Hands out the next account on every prompt, repeating the last one.
struct SwitchingWallet {
    accounts: Vec<Address>,
    prompts: AtomicUsize,
}

impl SwitchingWallet {
    fn new(accounts: impl Into<Vec<Address>>) -> Self {
        Self {
            accounts: accounts.into(),
            prompts: AtomicUsize::new(0),
        }
    }
}

impl WalletProvider for SwitchingWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ClientError> {
        let prompt = self.prompts.fetch_add(1, Ordering::SeqCst);
        let last = self.accounts.len().saturating_sub(1);

        Ok(self.accounts.get(prompt.min(last)).copied().into_iter().collect())
    }
}

#[tokio::test]
async fn test_connect_without_wallet() {
    let token = deploy();
    let mut app: TokenApp<StaticWallet, _, _> = TokenApp::new(None, binder(&token));

    let err = app.connect().await.unwrap_err();

    assert_eq!(Notice::from_error(&err).title, "Install a wallet");
    assert!(app.account().is_none());
    assert_eq!(app.sync_state(), SyncState::Idle);
    assert_eq!(app.balance_display(), "0");
}

#[tokio::test]
async fn test_declined_prompt_is_neutral() {
    let token = deploy();
    let mut app = TokenApp::new(Some(DecliningWallet), binder(&token));

    let err = app.connect().await.unwrap_err();
    let notice = Notice::from_error(&err);

    assert_eq!(notice.title, "Rejected");
    assert!(!notice.is_error());
    assert!(app.account().is_none());
    assert!(app.handle().is_none());
}

#[tokio::test]
async fn test_connect_loads_balance() {
    let token = deploy();
    let app = connected(&token, DEPLOYER).await;

    assert_eq!(app.account(), Some(DEPLOYER));
    assert_eq!(app.balance_display(), "1000000.0");
    assert!(app.is_listening());
}

#[tokio::test]
async fn test_transfer_scenario() {
    let token = deploy();
    let alice = connected(&token, ALICE).await;
    let deployer = connected(&token, DEPLOYER).await;
    let mut alice_balance = alice.watch_balance();

    let mut form = TransferForm::new(ALICE.to_string(), "1000");
    let receipt = form.submit(&deployer).await.unwrap().unwrap();
    assert_eq!(form, TransferForm::default());
    assert!(receipt.block_number.is_some());

    wait_for(&mut alice_balance, |s| {
        s.balance.as_ref().is_some_and(|b| b.display() == "1000.0")
    })
    .await;
    assert_eq!(alice.balance_display(), "1000.0");

    deployer.transfer(BOB, "200").await.unwrap();

    let sum = token.balance_of(DEPLOYER).await.unwrap()
        + token.balance_of(ALICE).await.unwrap()
        + token.balance_of(BOB).await.unwrap();
    assert_eq!(token.total_supply().await.unwrap(), sum);
}

#[tokio::test]
async fn test_sender_balance_follows_own_transfer() {
    let token = deploy();
    let deployer = connected(&token, DEPLOYER).await;
    let mut rx = deployer.watch_balance();

    deployer.transfer(ALICE, "0.5").await.unwrap();

    wait_for(&mut rx, |s| {
        s.balance.as_ref().is_some_and(|b| b.display() == "999999.5")
    })
    .await;
}

#[tokio::test]
async fn test_revert_keeps_form_inputs() {
    let token = deploy();
    let alice = connected(&token, ALICE).await;

    let mut form = TransferForm::new(BOB.to_string(), "1");
    let err = form.submit(&alice).await.unwrap_err();

    assert!(matches!(err, ClientError::Revert(_)));
    assert_eq!(Notice::from_error(&err).title, "Failed");
    assert_eq!(form, TransferForm::new(BOB.to_string(), "1"));
    assert_eq!(token.balance_of(BOB).await.unwrap(), U256::ZERO);
}

#[tokio::test]
async fn test_rejected_signature_keeps_form_inputs() {
    let token = deploy();
    let deployer = connected(&token, DEPLOYER).await;
    token.set_reject_signing(true);

    let mut form = TransferForm::new(ALICE.to_string(), "10");
    let err = form.submit(&deployer).await.unwrap_err();

    assert!(matches!(err, ClientError::UserRejected));
    assert!(form.is_complete());
    assert_eq!(token.block_number(), 0);
}

#[tokio::test]
async fn test_invalid_inputs() {
    let token = deploy();
    let deployer = connected(&token, DEPLOYER).await;

    let mut bad_recipient = TransferForm::new("0x1234", "1");
    assert!(matches!(
        bad_recipient.submit(&deployer).await,
        Err(ClientError::InvalidInput(_))
    ));

    let mut bad_amount = TransferForm::new(ALICE.to_string(), "1.5e3");
    assert!(matches!(
        bad_amount.submit(&deployer).await,
        Err(ClientError::InvalidInput(_))
    ));

    let mut empty = TransferForm::new(ALICE.to_string(), "");
    assert_eq!(empty.submit(&deployer).await.unwrap(), None);
    assert_eq!(token.block_number(), 0);
}

#[tokio::test]
async fn test_estimate_transfer() {
    let token = deploy();
    let deployer = connected(&token, DEPLOYER).await;
    let alice = connected(&token, ALICE).await;

    let gas = deployer.estimate_transfer(ALICE, "1000").await.unwrap();
    assert!(gas > 0);
    assert_eq!(token.block_number(), 0);

    let err = alice.estimate_transfer(BOB, "1").await.unwrap_err();
    assert!(matches!(err, ClientError::Revert(_)));

    let err = deployer.estimate_transfer(ALICE, "abc").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidInput(_)));
}

#[tokio::test]
async fn test_transfer_requires_connection() {
    let token = deploy();
    let app = app_for(&token, DEPLOYER);

    let err = app.transfer(ALICE, "1").await.unwrap_err();
    assert!(matches!(err, ClientError::ProviderUnavailable(_)));

    let err = app.estimate_transfer(ALICE, "1").await.unwrap_err();
    assert!(matches!(err, ClientError::ProviderUnavailable(_)));
}

#[tokio::test]
async fn test_reconnects_keep_a_single_listener() {
    let token = deploy();
    let mut app = app_for(&token, ALICE);
    let mut rx = app.watch_balance();

    for _ in 0..5 {
        let previous = app.handle().cloned();

        app.connect().await.unwrap();
        wait_for(&mut rx, |s| s.state == SyncState::Synced).await;

        if let Some(previous) = previous {
            assert_eq!(previous.listener_count(), 0);
        }
        assert_eq!(app.handle().map(|h| h.listener_count()), Some(1));
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(token.watcher_count(), 1);
}

#[tokio::test]
async fn test_failed_bind_keeps_previous_session() {
    let token = deploy();
    let binds = Arc::new(AtomicUsize::new(0));
    let bind = {
        let token = token.clone();
        let binds = binds.clone();
        move |_: &SwitchingWallet, account: Address| {
            if binds.fetch_add(1, Ordering::SeqCst) > 0 {
                return Err(ClientError::InvalidUrl("rpc endpoint went away".to_string()));
            }
            Ok(token.connect(account))
        }
    };
    let mut app = TokenApp::new(Some(SwitchingWallet::new([DEPLOYER, ALICE])), bind);
    let mut rx = app.watch_balance();

    app.connect().await.unwrap();
    wait_for(&mut rx, |s| s.state == SyncState::Synced).await;

    let err = app.connect().await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidUrl(_)));
    assert_eq!(binds.load(Ordering::SeqCst), 2);

    let snapshot = app.watch_balance().borrow().clone();
    assert_eq!(app.account(), Some(DEPLOYER));
    assert_eq!(snapshot.state, SyncState::Synced);
    assert_eq!(snapshot.balance.map(|b| b.holder()), Some(DEPLOYER));
    assert_eq!(app.balance_display(), "1000000.0");
    assert!(app.is_listening());
}

#[tokio::test]
async fn test_disconnect_releases_listener() {
    let token = deploy();
    let mut app = connected(&token, ALICE).await;
    let handle = app.handle().cloned().unwrap();

    app.disconnect();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(app.account().is_none());
    assert_eq!(app.sync_state(), SyncState::Idle);
    assert_eq!(handle.listener_count(), 0);
    assert_eq!(token.watcher_count(), 0);
}
