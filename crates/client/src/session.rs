//! Session management for a connected wallet account.

use crate::{error::ClientError, wallet::WalletProvider};
use alloy_primitives::Address;
use tracing::{debug, info};

/// An established wallet session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    account: Address,
}

impl Session {
    pub const fn account(&self) -> Address {
        self.account
    }
}

/// Owns the injected wallet and the current session, if any.
///
/// A session is only ever replaced as a whole: every successful
/// [`connect`](Self::connect) installs a fresh one.
#[derive(Debug)]
pub struct SessionManager<W> {
    wallet: Option<W>,
    session: Option<Session>,
}

impl<W> SessionManager<W>
where
    W: WalletProvider,
{
    /// `None` models a host without any wallet installed.
    pub const fn new(wallet: Option<W>) -> Self {
        Self {
            wallet,
            session: None,
        }
    }

    pub const fn wallet(&self) -> Option<&W> {
        self.wallet.as_ref()
    }

    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn account(&self) -> Option<Address> {
        self.session.map(|session| session.account)
    }

    /// Request account access from the wallet and make the first account
    /// the session.
    ///
    /// Prompts the wallet once per call, even when a session already exists.
    /// The existing session is kept if the request fails.
    pub async fn connect(&mut self) -> Result<Address, ClientError> {
        let account = self.request_account().await?;
        self.commit(account);

        Ok(account)
    }

    /// Prompt the wallet without touching the current session.
    ///
    /// Pair with [`commit`](Self::commit) when more work must succeed before
    /// the returned account becomes the session.
    pub async fn request_account(&self) -> Result<Address, ClientError> {
        let Some(wallet) = self.wallet.as_ref() else {
            return Err(ClientError::ProviderUnavailable(
                "no wallet installed".to_string(),
            ));
        };

        debug!("Requesting wallet accounts");
        let accounts = wallet.request_accounts().await?;

        accounts.first().copied().ok_or_else(|| {
            ClientError::ProviderUnavailable("wallet exposed no accounts".to_string())
        })
    }

    /// Replace the session with one for `account`.
    pub fn commit(&mut self, account: Address) {
        if let Some(previous) = self.session.replace(Session { account }) {
            debug!(previous = %previous.account, "Replacing wallet session");
        }
        info!(account = %account, "Wallet connected");
    }

    /// Drop the current session.
    pub fn disconnect(&mut self) -> Option<Session> {
        self.session.take()
    }
}
