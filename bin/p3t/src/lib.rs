//! P3T wallet session: application facade, configuration and metrics shared
//! by the `p3t` and `p3t-watch` binaries.

pub mod app;
pub mod config;
pub mod demo;
pub mod metrics;
pub mod notice;

pub use app::{TokenApp, TransferForm};
pub use notice::{format_account, Notice, Severity};

use alloy_primitives::Address;
use alloy_provider::DynProvider;
use binding::Erc20;
use client::{ClientError, LocalWallet, RemoteWallet, Wallet};
use std::time::Duration;

/// Pick the wallet from the command line.
///
/// A private key wins over a wallet endpoint. `None` when neither is given.
pub fn select_wallet(
    private_key: Option<&str>,
    wallet_url: Option<&str>,
) -> Result<Option<Wallet>, ClientError> {
    if let Some(private_key) = private_key {
        let wallet = LocalWallet::from_private_key(private_key)?;
        return Ok(Some(Wallet::Local(wallet)));
    }

    Ok(wallet_url.map(|url| Wallet::Remote(RemoteWallet::new(url))))
}

/// Make sure a remote wallet is pointed at the configured chain.
///
/// Local and watch-only wallets have no chain of their own and always pass.
pub async fn check_wallet_chain(wallet: &Wallet, expected: u64) -> Result<(), ClientError> {
    let Wallet::Remote(remote) = wallet else {
        return Ok(());
    };

    let chain_id = remote.chain_id().await?;
    if chain_id != expected {
        return Err(ClientError::InvalidInput(format!(
            "wallet is on chain {chain_id}, expected {expected}"
        )));
    }

    Ok(())
}

/// Binder for [`TokenApp`] producing an [`Erc20`] that signs through the
/// connected wallet.
pub fn erc20_binder(
    rpc_url: String,
    token: Address,
    poll_interval: Duration,
) -> impl Fn(&Wallet, Address) -> Result<Erc20<DynProvider>, ClientError> {
    move |wallet, account| {
        let provider = wallet.signer_provider(&rpc_url)?;

        Ok(Erc20::new(token, provider)
            .with_sender(account)
            .with_poll_interval(poll_interval))
    }
}
