//! Wallet session and provider plumbing.
//!
//! This crate provides:
//! - The error taxonomy every wallet, node and contract failure is mapped to
//! - The injected [`WalletProvider`] capability and its implementations
//! - The [`SessionManager`] that turns a wallet prompt into an active account
//! - Convenience constructors for read-only providers

mod error;
mod remote_wallet;
mod session;
mod wallet;

pub use error::{
    ClientError, ErrorKind, EXECUTION_REVERTED_CODE, UNAUTHORIZED_CODE, USER_REJECTED_CODE,
};
pub use remote_wallet::RemoteWallet;
pub use session::{Session, SessionManager};
pub use wallet::{LocalWallet, StaticWallet, Wallet, WalletProvider};

use alloy_provider::{Provider, ProviderBuilder};
use reqwest::Url;

pub(crate) fn parse_url(rpc_url: &str) -> Result<Url, ClientError> {
    rpc_url
        .parse()
        .map_err(|e| ClientError::InvalidUrl(format!("{}", e)))
}

/// Convenience function to create a read-only ethereum rpc provider from url.
pub fn create_provider(rpc_url: &str) -> Result<impl Provider + Clone, ClientError> {
    let url = parse_url(rpc_url)?;
    let provider = ProviderBuilder::new().connect_http(url);

    Ok(provider)
}
