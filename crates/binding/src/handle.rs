//! Callable token handle with a keyed listener registry.

use crate::{PendingTransfer, Token, TransferEvent, TransferFilter};
use alloy_primitives::{Address, U256};
use client::ClientError;
use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
};
use tokio::{sync::OnceCell, task::JoinHandle};
use tokio_retry::{strategy::ExponentialBackoff, RetryIf};
use tracing::{debug, info, warn};

/// Read attempts after the first failure.
const DEFAULT_READ_RETRIES: usize = 3;

/// A token contract bound to a signer or provider.
///
/// Cloning is cheap and shares the decimals cache and the listener registry.
/// `decimals` is read at most once per handle; a token whose decimals can
/// change needs a fresh handle.
#[derive(Clone)]
pub struct TokenHandle<T> {
    token: T,
    decimals: Arc<OnceCell<u8>>,
    listeners: Arc<Listeners>,
    read_retries: usize,
}

impl<T> TokenHandle<T>
where
    T: Token,
{
    /// Bind a backend. Does not touch the network.
    pub fn new(token: T) -> Self {
        Self {
            token,
            decimals: Arc::new(OnceCell::new()),
            listeners: Arc::new(Listeners::default()),
            read_retries: DEFAULT_READ_RETRIES,
        }
    }

    /// Override how many times a read is retried after a network failure.
    pub const fn with_read_retries(mut self, retries: usize) -> Self {
        self.read_retries = retries;
        self
    }

    pub const fn token(&self) -> &T {
        &self.token
    }

    pub fn address(&self) -> Address {
        self.token.address()
    }

    pub async fn balance_of(&self, holder: Address) -> Result<U256, ClientError> {
        self.read("balanceOf", || self.token.balance_of(holder))
            .await
    }

    /// Cached after the first successful read.
    pub async fn decimals(&self) -> Result<u8, ClientError> {
        self.decimals
            .get_or_try_init(|| self.read("decimals", || self.token.decimals()))
            .await
            .copied()
    }

    pub async fn total_supply(&self) -> Result<U256, ClientError> {
        self.read("totalSupply", || self.token.total_supply())
            .await
    }

    /// Gas estimate for `transfer(to, amount)` from the bound signer.
    pub async fn estimate_transfer_gas(&self, to: Address, amount: U256) -> Result<u64, ClientError> {
        self.read("estimateGas", || self.token.estimate_transfer_gas(to, amount))
            .await
    }

    /// Submit a transfer. Never retried.
    pub async fn transfer(&self, to: Address, amount: U256) -> Result<PendingTransfer, ClientError> {
        let pending = self.token.transfer(to, amount).await?;

        info!(
            token = %self.token.address(),
            to = %to,
            amount = %amount,
            tx_hash = %pending.tx_hash(),
            "Transfer submitted"
        );

        Ok(pending)
    }

    /// Deliver every `Transfer` matching `filter` to `handler`.
    ///
    /// A previous listener registered under an equal filter is stopped and
    /// replaced. Dropping the returned guard removes the listener.
    pub async fn subscribe<F>(
        &self,
        filter: TransferFilter,
        handler: F,
    ) -> Result<Subscription, ClientError>
    where
        F: Fn(TransferEvent) + Send + Sync + 'static,
    {
        let mut events = self.token.watch_transfers(filter).await?;

        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                handler(event);
            }
            debug!("Transfer feed closed");
        });

        let id = self.listeners.insert(filter, task);
        debug!(?filter, listeners = self.listeners.len(), "Transfer listener registered");

        Ok(Subscription {
            listeners: Arc::downgrade(&self.listeners),
            filter,
            id,
        })
    }

    /// Remove the listener registered under `filter`, if any.
    pub fn unsubscribe(&self, filter: &TransferFilter) -> bool {
        self.listeners.remove(filter, None)
    }

    /// Number of active listeners on this handle.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    async fn read<R, F, Fut>(&self, method: &'static str, op: F) -> Result<R, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, ClientError>>,
    {
        let retry_strategy = ExponentialBackoff::from_millis(2)
            .factor(50)
            .take(self.read_retries);

        RetryIf::spawn(retry_strategy, op, |e: &ClientError| {
            let retry = e.is_retryable();
            if retry {
                warn!(method, error = %e, "Token read failed, will retry");
            }
            retry
        })
        .await
    }
}

/// Guard for a registered listener.
///
/// Dropping it stops delivery, unless the listener was already replaced by a
/// newer subscription with the same filter.
#[derive(Debug)]
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    listeners: Weak<Listeners>,
    filter: TransferFilter,
    id: u64,
}

impl Subscription {
    pub const fn filter(&self) -> &TransferFilter {
        &self.filter
    }

    /// Whether this guard still owns the registered listener.
    pub fn is_active(&self) -> bool {
        self.listeners
            .upgrade()
            .is_some_and(|listeners| listeners.contains(&self.filter, self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            if listeners.remove(&self.filter, Some(self.id)) {
                debug!(filter = ?self.filter, "Transfer listener released");
            }
        }
    }
}

#[derive(Debug)]
struct Listener {
    id: u64,
    task: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct Listeners {
    next_id: AtomicU64,
    active: Mutex<HashMap<TransferFilter, Listener>>,
}

impl Listeners {
    fn lock(&self) -> MutexGuard<'_, HashMap<TransferFilter, Listener>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, filter: TransferFilter, task: JoinHandle<()>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        if let Some(previous) = self.lock().insert(filter, Listener { id, task }) {
            previous.task.abort();
            debug!(?filter, "Replaced existing transfer listener");
        }

        id
    }

    /// Remove the listener for `filter`; with `Some(id)`, only if it is still that one.
    fn remove(&self, filter: &TransferFilter, id: Option<u64>) -> bool {
        let mut active = self.lock();

        let owned = active
            .get(filter)
            .is_some_and(|listener| id.is_none_or(|id| listener.id == id));
        if !owned {
            return false;
        }

        if let Some(listener) = active.remove(filter) {
            listener.task.abort();
        }
        true
    }

    fn contains(&self, filter: &TransferFilter, id: u64) -> bool {
        self.lock()
            .get(filter)
            .is_some_and(|listener| listener.id == id)
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

impl Drop for Listeners {
    fn drop(&mut self) {
        let active = self.active.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, listener) in active.drain() {
            listener.task.abort();
        }
    }
}
