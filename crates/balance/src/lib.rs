//! Token balance state and its synchronization with the chain.
//!
//! This crate provides the [`BalanceState`] shown to the user, fixed-point
//! conversion helpers, and the [`BalanceSynchronizer`] that keeps the state
//! in step with `Transfer` events for the connected account.

pub mod sync;
pub mod units;

pub use sync::{BalanceSynchronizer, SyncSnapshot, SyncState};
pub use units::{format_units, parse_units, UnitsError};

use alloy_primitives::{Address, U256};

/// A token balance at a specific point in time.
///
/// `display` is derived from `raw` and `decimals` on construction and can
/// never be set on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceState {
    holder: Address,
    token: Address,
    raw: U256,
    decimals: u8,
    display: String,
}

impl BalanceState {
    pub fn new(holder: Address, token: Address, raw: U256, decimals: u8) -> Self {
        Self {
            holder,
            token,
            raw,
            decimals,
            display: format_units(raw, decimals),
        }
    }

    /// The address holding the balance
    pub const fn holder(&self) -> Address {
        self.holder
    }

    /// The token contract address
    pub const fn token(&self) -> Address {
        self.token
    }

    /// Amount in base units
    pub const fn raw(&self) -> U256 {
        self.raw
    }

    pub const fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Amount rendered at `decimals`
    pub fn display(&self) -> &str {
        &self.display
    }
}
