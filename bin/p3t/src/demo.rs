//! Simulated session against the in-memory token.
//!
//! Deploys 1,000,000 P3T to the deployer, sends 1,000 to Alice and 200 to
//! Bob, and checks that Alice's synchronized balance and the total supply
//! come out right.

use crate::app::TokenApp;
use alloy_primitives::{address, Address, U256};
use balance::{format_units, parse_units, SyncSnapshot};
use binding::{MemoryToken, Token};
use client::{ClientError, StaticWallet};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

pub const DEPLOYER: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub const ALICE: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
pub const BOB: Address = address!("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");

const DECIMALS: u8 = 18;
const INITIAL_SUPPLY: &str = "1000000";
const SYNC_TIMEOUT: Duration = Duration::from_secs(5);

/// Balances after the demo, in display units.
///
/// Serializes to the TOML table `p3t demo` prints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemoReport {
    pub deployer: String,
    pub alice: String,
    pub bob: String,
    pub total_supply: String,
    /// Alice's balance as seen by her synchronizer
    pub alice_synced: String,
}

impl DemoReport {
    /// Whether the balances add up to the total supply.
    pub fn is_consistent(&self) -> eyre::Result<bool> {
        let mut sum = U256::ZERO;
        for display in [&self.deployer, &self.alice, &self.bob] {
            sum += parse_units(display, DECIMALS)?;
        }

        Ok(sum == parse_units(&self.total_supply, DECIMALS)?)
    }
}

fn app_for(
    token: &MemoryToken,
    account: Address,
) -> TokenApp<StaticWallet, MemoryToken, impl Fn(&StaticWallet, Address) -> Result<MemoryToken, ClientError>>
{
    let token = token.clone();
    TokenApp::new(Some(StaticWallet::single(account)), move |_, account| {
        Ok(token.connect(account))
    })
}

async fn wait_for_balance(
    rx: &mut watch::Receiver<SyncSnapshot>,
    expected: &str,
) -> eyre::Result<String> {
    let snapshot = tokio::time::timeout(
        SYNC_TIMEOUT,
        rx.wait_for(|s| s.balance.as_ref().is_some_and(|b| b.display() == expected)),
    )
    .await
    .map_err(|_| eyre::eyre!("balance did not reach {expected}"))??;

    Ok(snapshot
        .balance
        .as_ref()
        .map(|b| b.display().to_string())
        .unwrap_or_default())
}

/// Run the scenario.
pub async fn run() -> eyre::Result<DemoReport> {
    let token = MemoryToken::deploy(DEPLOYER, parse_units(INITIAL_SUPPLY, DECIMALS)?, DECIMALS);
    info!(token = %token.address(), supply = INITIAL_SUPPLY, "Deployed in-memory P3T");

    let mut alice = app_for(&token, ALICE);
    let mut alice_balance = alice.watch_balance();
    alice.connect().await?;
    wait_for_balance(&mut alice_balance, "0.0").await?;

    let mut deployer = app_for(&token, DEPLOYER);
    deployer.connect().await?;

    let receipt = deployer.transfer(ALICE, "1000").await?;
    info!(tx_hash = %receipt.tx_hash, "Deployer sent 1000 P3T to Alice");
    let alice_synced = wait_for_balance(&mut alice_balance, "1000.0").await?;

    let receipt = deployer.transfer(BOB, "200").await?;
    info!(tx_hash = %receipt.tx_hash, "Deployer sent 200 P3T to Bob");

    let display = |raw: U256| format_units(raw, DECIMALS);
    let report = DemoReport {
        deployer: display(token.balance_of(DEPLOYER).await?),
        alice: display(token.balance_of(ALICE).await?),
        bob: display(token.balance_of(BOB).await?),
        total_supply: display(token.total_supply().await?),
        alice_synced,
    };

    alice.disconnect();
    deployer.disconnect();

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_scenario() {
        let report = run().await.unwrap();

        assert_eq!(report.alice_synced, "1000.0");
        assert_eq!(report.alice, "1000.0");
        assert_eq!(report.bob, "200.0");
        assert_eq!(report.deployer, "998800.0");
        assert_eq!(report.total_supply, "1000000.0");
        assert!(report.is_consistent().unwrap());
    }

    #[test]
    fn test_report_renders_as_toml() {
        let report = DemoReport {
            deployer: "998800.0".to_string(),
            alice: "1000.0".to_string(),
            bob: "200.0".to_string(),
            total_supply: "1000000.0".to_string(),
            alice_synced: "1000.0".to_string(),
        };

        let rendered = toml::to_string(&report).unwrap();
        assert!(rendered.contains(r#"deployer = "998800.0""#));
        assert!(rendered.contains(r#"alice_synced = "1000.0""#));
        assert!(report.is_consistent().unwrap());
    }
}
