//! Balance synchronization for the connected account.
//!
//! The synchronizer moves through three states:
//!
//! ```text
//!   Idle ──attach──▶ Loading ──initial read ok──▶ Synced
//!    ▲                  │                           │
//!    └──read failed─────┘                           │
//!    └──────────────attach / detach / drop──────────┘
//! ```
//!
//! Every attach starts a new generation. Reads and subscriptions carry the
//! generation they were started for and are discarded if it is no longer
//! current, so nothing from a superseded session reaches the snapshot.

use crate::BalanceState;
use alloy_primitives::Address;
use binding::{Subscription, Token, TokenHandle, TransferEvent, TransferFilter};
use client::ClientError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::{
    sync::{watch, Mutex as AsyncMutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncState {
    /// No handle or account
    #[default]
    Idle,
    /// Initial read in flight
    Loading,
    /// Listener active, last known balance valid
    Synced,
}

/// What observers see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub state: SyncState,
    pub balance: Option<BalanceState>,
}

#[derive(Debug, Default)]
struct Lifecycle {
    generation: u64,
    subscription: Option<Subscription>,
}

#[derive(Debug)]
struct Shared {
    lifecycle: Mutex<Lifecycle>,
    subscribing: AsyncMutex<()>,
    snapshot: watch::Sender<SyncSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new generation and hand back the old subscription for release.
    fn advance(&self) -> (u64, Option<Subscription>) {
        let mut lifecycle = self.lock();
        lifecycle.generation += 1;
        let released = lifecycle.subscription.take();
        self.snapshot.send_replace(SyncSnapshot::default());

        (lifecycle.generation, released)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    fn begin_loading(&self, generation: u64) {
        let lifecycle = self.lock();
        if lifecycle.generation == generation {
            self.snapshot.send_replace(SyncSnapshot {
                state: SyncState::Loading,
                balance: None,
            });
        }
    }

    /// Enter `Synced`, or return the subscription if `generation` is stale.
    fn install(
        &self,
        generation: u64,
        subscription: Subscription,
        balance: BalanceState,
    ) -> Result<(), Subscription> {
        let mut lifecycle = self.lock();
        if lifecycle.generation != generation {
            return Err(subscription);
        }

        lifecycle.subscription = Some(subscription);
        self.snapshot.send_replace(SyncSnapshot {
            state: SyncState::Synced,
            balance: Some(balance),
        });
        Ok(())
    }

    fn fail(&self, generation: u64) {
        let lifecycle = self.lock();
        if lifecycle.generation == generation {
            self.snapshot.send_replace(SyncSnapshot::default());
        }
    }

    fn apply(&self, generation: u64, result: Result<BalanceState, ClientError>) {
        let lifecycle = self.lock();
        if lifecycle.generation != generation {
            debug!(generation, "Discarding balance read for superseded session");
            return;
        }

        match result {
            Ok(balance) => {
                self.snapshot.send_if_modified(|snapshot| {
                    if snapshot.balance.as_ref() == Some(&balance) {
                        return false;
                    }
                    debug!(holder = %balance.holder(), balance = balance.display(), "Balance refreshed");
                    snapshot.balance = Some(balance);
                    true
                });
            }
            Err(e) => warn!(error = %e, "Balance refresh failed, keeping last known balance"),
        }
    }
}

struct Target<T> {
    handle: TokenHandle<T>,
    account: Address,
    generation: u64,
}

/// Keeps one account's token balance in step with the chain.
///
/// At most one `Transfer` subscription is held at any time; it is released
/// on every transition away from `Synced`, including drop.
pub struct BalanceSynchronizer<T> {
    shared: Arc<Shared>,
    target: Option<Target<T>>,
    loader: Option<JoinHandle<()>>,
}

impl<T> Default for BalanceSynchronizer<T>
where
    T: Token,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BalanceSynchronizer<T>
where
    T: Token,
{
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(SyncSnapshot::default());

        Self {
            shared: Arc::new(Shared {
                lifecycle: Mutex::new(Lifecycle::default()),
                subscribing: AsyncMutex::new(()),
                snapshot,
            }),
            target: None,
            loader: None,
        }
    }

    /// Observe snapshot changes.
    pub fn watch(&self) -> watch::Receiver<SyncSnapshot> {
        self.shared.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    pub fn state(&self) -> SyncState {
        self.shared.snapshot.borrow().state
    }

    pub fn balance(&self) -> Option<BalanceState> {
        self.shared.snapshot.borrow().balance.clone()
    }

    pub fn account(&self) -> Option<Address> {
        self.target.as_ref().map(|target| target.account)
    }

    /// Whether the synchronizer currently owns an active transfer listener.
    pub fn is_listening(&self) -> bool {
        self.shared
            .lock()
            .subscription
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Start synchronizing `account` through `handle`.
    ///
    /// Releases whatever the previous session held before anything new is
    /// acquired. Must be called within a Tokio runtime.
    pub fn attach(&mut self, handle: TokenHandle<T>, account: Address) {
        let generation = self.teardown();
        self.shared.begin_loading(generation);

        info!(
            token = %handle.address(),
            account = %account,
            generation,
            "Synchronizing balance"
        );

        self.loader = Some(tokio::spawn(load(
            Arc::clone(&self.shared),
            handle.clone(),
            account,
            generation,
        )));
        self.target = Some(Target {
            handle,
            account,
            generation,
        });
    }

    /// Return to `Idle`, releasing the subscription.
    pub fn detach(&mut self) {
        if self.target.is_some() {
            self.teardown();
        }
    }

    /// Re-read the balance outside of event delivery.
    pub fn refresh(&self) {
        let Some(target) = self.target.as_ref() else {
            return;
        };

        let shared = Arc::clone(&self.shared);
        let handle = target.handle.clone();
        let account = target.account;
        let generation = target.generation;

        tokio::spawn(async move {
            let result = read_balance(&handle, account).await;
            shared.apply(generation, result);
        });
    }

    fn teardown(&mut self) -> u64 {
        if let Some(loader) = self.loader.take() {
            loader.abort();
        }

        let previous = self.target.take();
        let (generation, released) = self.shared.advance();

        if let Some(previous) = previous {
            debug!(
                account = %previous.account,
                generation = previous.generation,
                released_listener = released.is_some(),
                "Balance session torn down"
            );
        }
        drop(released);

        generation
    }
}

impl<T> Drop for BalanceSynchronizer<T> {
    fn drop(&mut self) {
        if let Some(loader) = self.loader.take() {
            loader.abort();
        }
        let (_, released) = self.shared.advance();
        drop(released);
    }
}

async fn read_balance<T: Token>(
    handle: &TokenHandle<T>,
    account: Address,
) -> Result<BalanceState, ClientError> {
    let decimals = handle.decimals().await?;
    let raw = handle.balance_of(account).await?;

    Ok(BalanceState::new(account, handle.address(), raw, decimals))
}

async fn load<T: Token>(
    shared: Arc<Shared>,
    handle: TokenHandle<T>,
    account: Address,
    generation: u64,
) {
    let balance = match read_balance(&handle, account).await {
        Ok(balance) => balance,
        Err(e) => {
            warn!(account = %account, error = %e, "Initial balance read failed");
            shared.fail(generation);
            return;
        }
    };

    let handler = refresh_on_transfer(
        Arc::downgrade(&shared),
        handle.token().clone(),
        account,
        balance.decimals(),
        generation,
    );

    // An aborted loader can still be mid-poll on another worker. Subscribing
    // under the gate, for the current generation only, keeps it from
    // registering after its successor on the same filter.
    let _gate = shared.subscribing.lock().await;
    if !shared.is_current(generation) {
        debug!(generation, "Skipping subscription for superseded session");
        return;
    }

    let subscription = match handle.subscribe(TransferFilter::any(), handler).await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(account = %account, error = %e, "Failed to subscribe to transfers");
            shared.fail(generation);
            return;
        }
    };

    let shown = balance.display().to_string();
    match shared.install(generation, subscription, balance) {
        Ok(()) => info!(account = %account, balance = %shown, "Balance synced"),
        Err(stale) => {
            debug!(generation, "Dropping subscription for superseded session");
            drop(stale);
        }
    }
}

/// Handler re-reading the balance whenever a transfer touches `account`.
fn refresh_on_transfer<T: Token>(
    shared: Weak<Shared>,
    token: T,
    account: Address,
    decimals: u8,
    generation: u64,
) -> impl Fn(TransferEvent) + Send + Sync + 'static {
    move |event: TransferEvent| {
        if !event.involves(account) {
            return;
        }
        let Some(shared) = shared.upgrade() else {
            return;
        };

        debug!(
            from = %event.from,
            to = %event.to,
            block = event.block_number,
            "Transfer touches account, refreshing balance"
        );

        let token = token.clone();
        tokio::spawn(async move {
            let result = token
                .balance_of(account)
                .await
                .map(|raw| BalanceState::new(account, token.address(), raw, decimals));
            shared.apply(generation, result);
        });
    }
}
