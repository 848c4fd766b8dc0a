//! The wallet session as seen by a user interface.

use crate::metrics::Metrics;
use alloy_primitives::{Address, U256};
use balance::{parse_units, BalanceSynchronizer, SyncSnapshot, SyncState};
use binding::{Token, TokenHandle, TransferReceipt};
use client::{ClientError, SessionManager, WalletProvider};
use tokio::sync::watch;
use tracing::{info, warn};

/// Connects a wallet, binds the token for the connected account and keeps
/// its balance synchronized.
///
/// `bind` builds the token backend for a wallet and account. It runs on
/// every successful [`connect`](Self::connect), so reconnecting always
/// yields a fresh handle.
pub struct TokenApp<W, T, B> {
    session: SessionManager<W>,
    bind: B,
    handle: Option<TokenHandle<T>>,
    sync: BalanceSynchronizer<T>,
    metrics: Metrics,
}

impl<W, T, B> TokenApp<W, T, B>
where
    W: WalletProvider,
    T: Token,
    B: Fn(&W, Address) -> Result<T, ClientError>,
{
    pub fn new(wallet: Option<W>, bind: B) -> Self {
        Self {
            session: SessionManager::new(wallet),
            bind,
            handle: None,
            sync: BalanceSynchronizer::new(),
            metrics: Metrics::new(),
        }
    }

    pub const fn wallet(&self) -> Option<&W> {
        self.session.wallet()
    }

    pub fn account(&self) -> Option<Address> {
        self.session.account()
    }

    /// Last known balance, `0` until the first read lands.
    pub fn balance_display(&self) -> String {
        self.sync
            .balance()
            .map_or_else(|| "0".to_string(), |balance| balance.display().to_string())
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    pub fn watch_balance(&self) -> watch::Receiver<SyncSnapshot> {
        self.sync.watch()
    }

    pub fn is_listening(&self) -> bool {
        self.sync.is_listening()
    }

    pub const fn handle(&self) -> Option<&TokenHandle<T>> {
        self.handle.as_ref()
    }

    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Prompt the wallet and start synchronizing the returned account.
    ///
    /// On failure the previous session, if any, stays in place.
    pub async fn connect(&mut self) -> Result<Address, ClientError> {
        let result = self.establish().await;
        self.metrics.record_connect(&result);
        result
    }

    async fn establish(&mut self) -> Result<Address, ClientError> {
        let account = self.session.request_account().await?;

        let Some(wallet) = self.session.wallet() else {
            return Err(ClientError::ProviderUnavailable(
                "no wallet installed".to_string(),
            ));
        };
        let token = (self.bind)(wallet, account)?;
        self.session.commit(account);

        let handle = TokenHandle::new(token);
        self.sync.attach(handle.clone(), account);
        self.handle = Some(handle);

        Ok(account)
    }

    /// Drop the session and stop synchronizing.
    pub fn disconnect(&mut self) {
        self.sync.detach();
        self.handle = None;
        if let Some(session) = self.session.disconnect() {
            info!(account = %session.account(), "Wallet disconnected");
        }
    }

    /// Send `amount` (in display units) to `to` and wait for inclusion.
    pub async fn transfer(&self, to: Address, amount: &str) -> Result<TransferReceipt, ClientError> {
        let result = self.send(to, amount).await;
        self.metrics.record_transfer(&result);

        match &result {
            Ok(_) => self.sync.refresh(),
            Err(e) => warn!(to = %to, amount, error = %e, "Transfer failed"),
        }

        result
    }

    /// Gas the connected account would spend sending `amount` to `to`.
    pub async fn estimate_transfer(&self, to: Address, amount: &str) -> Result<u64, ClientError> {
        let handle = self.connected()?;
        let amount = base_units(handle, amount).await?;

        handle.estimate_transfer_gas(to, amount).await
    }

    fn connected(&self) -> Result<&TokenHandle<T>, ClientError> {
        self.handle.as_ref().ok_or_else(|| {
            ClientError::ProviderUnavailable("wallet not connected".to_string())
        })
    }

    async fn send(&self, to: Address, amount: &str) -> Result<TransferReceipt, ClientError> {
        let handle = self.connected()?;
        let amount = base_units(handle, amount).await?;

        let pending = handle.transfer(to, amount).await?;
        let receipt = pending.confirm().await?;

        info!(
            tx_hash = %receipt.tx_hash,
            block = ?receipt.block_number,
            gas_used = ?receipt.gas_used,
            "Transfer confirmed"
        );

        Ok(receipt)
    }
}

async fn base_units<T: Token>(handle: &TokenHandle<T>, amount: &str) -> Result<U256, ClientError> {
    let decimals = handle.decimals().await?;
    parse_units(amount, decimals).map_err(|e| ClientError::InvalidInput(e.to_string()))
}

/// Recipient and amount inputs of the transfer form.
///
/// Inputs are kept when a transfer fails, so the user can correct them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferForm {
    pub recipient: String,
    pub amount: String,
}

impl TransferForm {
    pub fn new(recipient: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            amount: amount.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.recipient.trim().is_empty() && !self.amount.trim().is_empty()
    }

    pub fn clear(&mut self) {
        self.recipient.clear();
        self.amount.clear();
    }

    /// Submit through `app`. Does nothing while either input is empty.
    ///
    /// Both inputs are cleared only after the transfer is confirmed.
    pub async fn submit<W, T, B>(
        &mut self,
        app: &TokenApp<W, T, B>,
    ) -> Result<Option<TransferReceipt>, ClientError>
    where
        W: WalletProvider,
        T: Token,
        B: Fn(&W, Address) -> Result<T, ClientError>,
    {
        if !self.is_complete() {
            return Ok(None);
        }

        let to: Address = self
            .recipient
            .trim()
            .parse()
            .map_err(|e| ClientError::InvalidInput(format!("recipient: {e}")))?;

        let receipt = app.transfer(to, &self.amount).await?;
        self.clear();

        Ok(Some(receipt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_completeness() {
        assert!(!TransferForm::default().is_complete());
        assert!(!TransferForm::new("0x70997970C51812dc3A010C7d01b50e0d17dc79C8", " ").is_complete());
        assert!(TransferForm::new("0x70997970C51812dc3A010C7d01b50e0d17dc79C8", "1").is_complete());
    }

    #[test]
    fn test_form_clear() {
        let mut form = TransferForm::new("0x70997970C51812dc3A010C7d01b50e0d17dc79C8", "1.5");
        form.clear();
        assert_eq!(form, TransferForm::default());
    }
}
