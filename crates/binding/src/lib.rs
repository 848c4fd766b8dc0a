//! Contract binding for the P3T token.
//!
//! This crate provides:
//! - The Solidity interface, generated with alloy's `sol!` macro
//! - The [`Token`] backend trait and its two implementations: [`Erc20`] over
//!   any alloy provider and [`MemoryToken`], an in-memory ledger
//! - [`TokenHandle`], which caches `decimals`, retries transient reads and
//!   owns at most one listener per [`TransferFilter`]

pub mod erc20;
pub mod handle;
pub mod memory;
pub mod token;

pub use erc20::Erc20;
pub use handle::{Subscription, TokenHandle};
pub use memory::MemoryToken;

use alloy_primitives::{Address, TxHash, U256};
use client::ClientError;
use std::{fmt, future::Future, pin::Pin};
use tokio::sync::mpsc;

/// Key of a `Transfer` subscription: the indexed arguments to match.
///
/// `None` matches any address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TransferFilter {
    pub from: Option<Address>,
    pub to: Option<Address>,
}

impl TransferFilter {
    /// Matches every transfer.
    pub const fn any() -> Self {
        Self {
            from: None,
            to: None,
        }
    }

    pub const fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub const fn to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    pub fn matches(&self, event: &TransferEvent) -> bool {
        self.from.is_none_or(|from| from == event.from)
            && self.to.is_none_or(|to| to == event.to)
    }
}

/// A decoded `Transfer` log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub block_number: u64,
    pub log_index: u64,
    pub tx_hash: Option<TxHash>,
}

impl TransferEvent {
    /// Whether `account` sent or received this transfer.
    pub fn involves(&self, account: Address) -> bool {
        self.from == account || self.to == account
    }
}

/// Confirmation of an included transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Transaction hash
    pub tx_hash: TxHash,
    /// Block number where transaction was included
    pub block_number: Option<u64>,
    /// Gas used
    pub gas_used: Option<u64>,
}

type Inclusion = Pin<Box<dyn Future<Output = Result<TransferReceipt, ClientError>> + Send>>;

/// A submitted transfer that has not been awaited yet.
///
/// The hash is known as soon as the wallet accepts the transaction;
/// inclusion is only observed through [`PendingTransfer::confirm`].
pub struct PendingTransfer {
    tx_hash: TxHash,
    inclusion: Inclusion,
}

impl PendingTransfer {
    pub fn new<F>(tx_hash: TxHash, inclusion: F) -> Self
    where
        F: Future<Output = Result<TransferReceipt, ClientError>> + Send + 'static,
    {
        Self {
            tx_hash,
            inclusion: Box::pin(inclusion),
        }
    }

    pub const fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    /// Wait until the transfer is included.
    ///
    /// Fails with [`ClientError::Revert`] when the receipt reports failure.
    pub async fn confirm(self) -> Result<TransferReceipt, ClientError> {
        self.inclusion.await
    }
}

impl fmt::Debug for PendingTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTransfer")
            .field("tx_hash", &self.tx_hash)
            .finish_non_exhaustive()
    }
}

/// Backend able to serve the token's read, write and event surface.
pub trait Token: Clone + Send + Sync + 'static {
    /// Deployed contract address.
    fn address(&self) -> Address;

    fn balance_of(
        &self,
        holder: Address,
    ) -> impl Future<Output = Result<U256, ClientError>> + Send;

    fn decimals(&self) -> impl Future<Output = Result<u8, ClientError>> + Send;

    fn total_supply(&self) -> impl Future<Output = Result<U256, ClientError>> + Send;

    /// Submit `transfer(to, amount)` from the bound signer.
    fn transfer(
        &self,
        to: Address,
        amount: U256,
    ) -> impl Future<Output = Result<PendingTransfer, ClientError>> + Send;

    /// Gas the bound signer's `transfer(to, amount)` would use.
    ///
    /// Fails with a revert when the transfer would revert.
    fn estimate_transfer_gas(
        &self,
        to: Address,
        amount: U256,
    ) -> impl Future<Output = Result<u64, ClientError>> + Send;

    /// Start delivering `Transfer` events matching `filter`, in chain order.
    ///
    /// Delivery stops once the receiver is dropped.
    fn watch_transfers(
        &self,
        filter: TransferFilter,
    ) -> impl Future<Output = Result<mpsc::UnboundedReceiver<TransferEvent>, ClientError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const ALICE: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
    const BOB: Address = address!("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");

    fn event(from: Address, to: Address) -> TransferEvent {
        TransferEvent {
            from,
            to,
            value: U256::from(1),
            block_number: 1,
            log_index: 0,
            tx_hash: None,
        }
    }

    #[test]
    fn test_filter_matching() {
        let transfer = event(ALICE, BOB);

        assert!(TransferFilter::any().matches(&transfer));
        assert!(TransferFilter::any().from(ALICE).matches(&transfer));
        assert!(TransferFilter::any().to(BOB).matches(&transfer));
        assert!(!TransferFilter::any().to(ALICE).matches(&transfer));
        assert!(!TransferFilter::any().from(BOB).to(ALICE).matches(&transfer));
    }

    #[test]
    fn test_involves_ignores_hex_case() {
        let lower: Address = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8".parse().unwrap();
        let transfer = event(BOB, ALICE);

        assert!(transfer.involves(lower));
        assert!(!transfer.involves(Address::ZERO));
    }

    #[tokio::test]
    async fn test_pending_transfer_confirms() {
        let receipt = TransferReceipt {
            tx_hash: TxHash::repeat_byte(1),
            block_number: Some(7),
            gas_used: None,
        };
        let expected = receipt.clone();

        let pending = PendingTransfer::new(receipt.tx_hash, async move { Ok(receipt) });
        assert_eq!(pending.tx_hash(), TxHash::repeat_byte(1));
        assert_eq!(pending.confirm().await.unwrap(), expected);
    }
}
