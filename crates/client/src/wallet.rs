//! Wallet capabilities the session manager can be connected to.

use crate::{create_provider, error::ClientError, parse_url, RemoteWallet};
use alloy_network::EthereumWallet;
use alloy_primitives::Address;
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_signer_local::PrivateKeySigner;
use std::future::Future;

/// Account access exposed by a wallet.
///
/// This is the injected counterpart of a browser's `window.ethereum`: the
/// session manager only ever talks to a wallet through this trait.
pub trait WalletProvider: Send + Sync {
    /// Ask the wallet for account access.
    ///
    /// Interactive wallets prompt the user on every call.
    fn request_accounts(&self) -> impl Future<Output = Result<Vec<Address>, ClientError>> + Send;
}

/// Wallet backed by a local private key.
#[derive(Debug, Clone)]
pub struct LocalWallet {
    signer: PrivateKeySigner,
}

impl LocalWallet {
    /// Parse a hex private key (with or without `0x`).
    pub fn from_private_key(private_key: &str) -> Result<Self, ClientError> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| ClientError::InvalidPrivateKey(format!("{}", e)))?;

        Ok(Self { signer })
    }

    pub const fn from_signer(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Provider that signs transactions locally and submits them to `rpc_url`.
    pub fn signer_provider(&self, rpc_url: &str) -> Result<DynProvider, ClientError> {
        let url = parse_url(rpc_url)?;
        let wallet = EthereumWallet::from(self.signer.clone());

        Ok(ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(url)
            .erased())
    }
}

impl WalletProvider for LocalWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ClientError> {
        Ok(vec![self.signer.address()])
    }
}

/// Wallet exposing a fixed set of accounts and no signing.
///
/// Used for watch-only sessions and simulations.
#[derive(Debug, Clone, Default)]
pub struct StaticWallet {
    accounts: Vec<Address>,
}

impl StaticWallet {
    pub const fn new(accounts: Vec<Address>) -> Self {
        Self { accounts }
    }

    pub fn single(account: Address) -> Self {
        Self::new(vec![account])
    }
}

impl WalletProvider for StaticWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ClientError> {
        Ok(self.accounts.clone())
    }
}

/// Any of the supported wallets, selected at runtime.
#[derive(Debug, Clone)]
pub enum Wallet {
    Local(LocalWallet),
    Remote(RemoteWallet),
    Static(StaticWallet),
}

impl Wallet {
    /// Provider used for contract calls made on behalf of the connected account.
    ///
    /// Local keys sign and submit through `rpc_url`; remote wallets sign
    /// and submit themselves; static wallets get a read-only provider.
    pub fn signer_provider(&self, rpc_url: &str) -> Result<DynProvider, ClientError> {
        match self {
            Self::Local(wallet) => wallet.signer_provider(rpc_url),
            Self::Remote(wallet) => wallet.signer_provider(),
            Self::Static(_) => Ok(create_provider(rpc_url)?.erased()),
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Remote(_) => "remote",
            Self::Static(_) => "watch-only",
        }
    }
}

impl WalletProvider for Wallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ClientError> {
        match self {
            Self::Local(wallet) => wallet.request_accounts().await,
            Self::Remote(wallet) => wallet.request_accounts().await,
            Self::Static(wallet) => wallet.request_accounts().await,
        }
    }
}
