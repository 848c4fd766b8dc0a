//! In-memory ERC20 ledger.
//!
//! Mirrors the token's transfer rules closely enough to run the wallet
//! session without a chain: simulations, demos and deterministic tests.

use crate::{PendingTransfer, Token, TransferEvent, TransferFilter, TransferReceipt};
use alloy_primitives::{address, keccak256, Address, TxHash, U256};
use client::ClientError;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::debug;

/// Address the simulated token is "deployed" at.
pub const MEMORY_TOKEN_ADDRESS: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");

/// Gas reported for every simulated transfer.
const TRANSFER_GAS: u64 = 51_000;

#[derive(Debug)]
struct Watcher {
    filter: TransferFilter,
    events: mpsc::UnboundedSender<TransferEvent>,
}

#[derive(Debug, Default)]
struct Ledger {
    decimals: u8,
    total_supply: U256,
    balances: HashMap<Address, U256>,
    block_number: u64,
    watchers: Vec<Watcher>,
    reads: u64,
    failing_reads: u32,
    reverting_reads: u32,
    read_delay: Option<Duration>,
    reject_signing: bool,
}

impl Ledger {
    fn balance(&self, holder: Address) -> U256 {
        self.balances.get(&holder).copied().unwrap_or_default()
    }

    /// Sender balance if `from` may move `amount` to `to`, else the revert.
    fn check_transfer(&self, from: Address, to: Address, amount: U256) -> Result<U256, ClientError> {
        if to == Address::ZERO {
            return Err(ClientError::Revert(format!(
                "ERC20InvalidReceiver({})",
                Address::ZERO
            )));
        }

        let balance = self.balance(from);
        if balance < amount {
            return Err(ClientError::Revert(format!(
                "ERC20InsufficientBalance({from}, {balance}, {amount})"
            )));
        }

        Ok(balance)
    }

    /// Count a read attempt and apply injected failures.
    fn begin_read(&mut self) -> Result<Option<Duration>, ClientError> {
        self.reads += 1;

        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return Err(ClientError::Network("connection reset".to_string()));
        }
        if self.reverting_reads > 0 {
            self.reverting_reads -= 1;
            return Err(ClientError::Revert("execution reverted".to_string()));
        }

        Ok(self.read_delay)
    }

    fn emit(&mut self, event: &TransferEvent) {
        self.watchers.retain(|watcher| !watcher.events.is_closed());

        for watcher in &self.watchers {
            if watcher.filter.matches(event) {
                // A receiver dropped since `retain` is pruned on the next emit.
                let _ = watcher.events.send(event.clone());
            }
        }
    }
}

/// A simulated token shared between every clone and every
/// [`connect`](MemoryToken::connect)ed sender.
#[derive(Debug, Clone)]
pub struct MemoryToken {
    sender: Address,
    ledger: Arc<Mutex<Ledger>>,
}

impl MemoryToken {
    /// Deploy with `initial_supply` base units credited to `deployer`.
    ///
    /// Like the deployed contract, minting emits `Transfer(0x0, deployer)`,
    /// which no watcher can observe yet.
    pub fn deploy(deployer: Address, initial_supply: U256, decimals: u8) -> Self {
        let mut ledger = Ledger {
            decimals,
            total_supply: initial_supply,
            ..Default::default()
        };
        ledger.balances.insert(deployer, initial_supply);

        debug!(%deployer, %initial_supply, decimals, "Deployed in-memory token");

        Self {
            sender: deployer,
            ledger: Arc::new(Mutex::new(ledger)),
        }
    }

    /// Same ledger, transactions sent by `sender`.
    pub fn connect(&self, sender: Address) -> Self {
        Self {
            sender,
            ledger: self.ledger.clone(),
        }
    }

    pub const fn sender(&self) -> Address {
        self.sender
    }

    /// The next `count` reads fail with a network error.
    pub fn fail_next_reads(&self, count: u32) {
        self.lock().failing_reads = count;
    }

    /// The next `count` reads fail with a revert.
    pub fn revert_next_reads(&self, count: u32) {
        self.lock().reverting_reads = count;
    }

    /// Delay every successful read, to widen race windows in tests.
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        self.lock().read_delay = delay;
    }

    /// Make the signer decline every transfer.
    pub fn set_reject_signing(&self, reject: bool) {
        self.lock().reject_signing = reject;
    }

    /// Read attempts served so far, failed ones included.
    pub fn read_count(&self) -> u64 {
        self.lock().reads
    }

    /// Open event feeds on the ledger.
    pub fn watcher_count(&self) -> usize {
        let mut ledger = self.lock();
        ledger.watchers.retain(|watcher| !watcher.events.is_closed());
        ledger.watchers.len()
    }

    /// Current simulated block height.
    pub fn block_number(&self) -> u64 {
        self.lock().block_number
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn read<R>(&self, read: impl FnOnce(&Ledger) -> R) -> Result<R, ClientError> {
        let delay = self.lock().begin_read()?;

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        Ok(read(&self.lock()))
    }

    fn apply_transfer(&self, to: Address, amount: U256) -> Result<TransferReceipt, ClientError> {
        let mut ledger = self.lock();

        if ledger.reject_signing {
            return Err(ClientError::UserRejected);
        }

        let from = self.sender;
        let balance = ledger.check_transfer(from, to, amount)?;

        ledger.balances.insert(from, balance - amount);
        let credited = ledger.balance(to) + amount;
        ledger.balances.insert(to, credited);
        ledger.block_number += 1;

        let block_number = ledger.block_number;
        let tx_hash = transfer_hash(block_number, from, to, amount);
        let event = TransferEvent {
            from,
            to,
            value: amount,
            block_number,
            log_index: 0,
            tx_hash: Some(tx_hash),
        };
        ledger.emit(&event);

        debug!(%from, %to, %amount, block_number, "Simulated transfer");

        Ok(TransferReceipt {
            tx_hash,
            block_number: Some(block_number),
            gas_used: Some(TRANSFER_GAS),
        })
    }
}

fn transfer_hash(block_number: u64, from: Address, to: Address, amount: U256) -> TxHash {
    let mut preimage = Vec::with_capacity(8 + 20 + 20 + 32);
    preimage.extend_from_slice(&block_number.to_be_bytes());
    preimage.extend_from_slice(from.as_slice());
    preimage.extend_from_slice(to.as_slice());
    preimage.extend_from_slice(&amount.to_be_bytes::<32>());
    keccak256(preimage)
}

impl Token for MemoryToken {
    fn address(&self) -> Address {
        MEMORY_TOKEN_ADDRESS
    }

    async fn balance_of(&self, holder: Address) -> Result<U256, ClientError> {
        self.read(|ledger| ledger.balance(holder)).await
    }

    async fn decimals(&self) -> Result<u8, ClientError> {
        self.read(|ledger| ledger.decimals).await
    }

    async fn total_supply(&self) -> Result<U256, ClientError> {
        self.read(|ledger| ledger.total_supply).await
    }

    async fn estimate_transfer_gas(&self, to: Address, amount: U256) -> Result<u64, ClientError> {
        let from = self.sender;
        self.read(|ledger| ledger.check_transfer(from, to, amount))
            .await??;

        Ok(TRANSFER_GAS)
    }

    async fn transfer(&self, to: Address, amount: U256) -> Result<PendingTransfer, ClientError> {
        let receipt = self.apply_transfer(to, amount)?;
        Ok(PendingTransfer::new(receipt.tx_hash, async move {
            Ok(receipt)
        }))
    }

    async fn watch_transfers(
        &self,
        filter: TransferFilter,
    ) -> Result<mpsc::UnboundedReceiver<TransferEvent>, ClientError> {
        let (events, receiver) = mpsc::unbounded_channel();
        self.lock().watchers.push(Watcher { filter, events });
        Ok(receiver)
    }
}
