//! Common test setup utilities shared across live-chain tests.
#![allow(dead_code)] // used in ignored tests

use alloy_provider::{DynProvider, Provider};
use binding::{Erc20, TokenHandle};
use client::LocalWallet;
use p3t::config::Config;
use serde::Deserialize;

/// Local configuration with private key (git-ignored file)
#[derive(Debug, Deserialize)]
struct LocalConfig {
    private_key: String,
}

/// Load test configuration. Panics if not found or invalid.
pub fn load_test_config() -> Config {
    let config_path = "tests/test-config.toml";

    let current_dir = std::env::current_dir().unwrap();
    eprintln!("Looking for config at: {:?}", current_dir.join(config_path));

    Config::from_file(config_path).expect("Failed to load tests/test-config.toml.")
}

/// Load private key for signing transactions.
///
/// Tries multiple sources in order:
/// 1. PRIVATE_KEY environment variable
/// 2. tests/test-config.local.toml file (git-ignored)
///
/// Returns None if no private key is found.
pub fn load_private_key() -> Option<String> {
    if let Ok(pk) = std::env::var("PRIVATE_KEY") {
        eprintln!("✓ Loaded private key from PRIVATE_KEY environment variable");
        return Some(pk);
    }

    let local_config_path = "tests/test-config.local.toml";
    if let Ok(contents) = std::fs::read_to_string(local_config_path) {
        if let Ok(config) = toml::from_str::<LocalConfig>(&contents) {
            eprintln!("✓ Loaded private key from {}", local_config_path);
            return Some(config.private_key);
        }
    }

    eprintln!("⚠ No private key found. Checked:");
    eprintln!("  1. PRIVATE_KEY environment variable");
    eprintln!("  2. tests/test-config.local.toml file");
    None
}

/// Read-only token handle for the configured network.
pub fn setup_token(config: &Config) -> TokenHandle<Erc20<DynProvider>> {
    let provider = client::create_provider(&config.rpc_url)
        .expect("Failed to create provider")
        .erased();

    TokenHandle::new(
        Erc20::new(config.network_config().token, provider)
            .with_poll_interval(config.poll_interval()),
    )
}

/// Wallet for signing transactions.
///
/// # Panics
/// Panics if no private key is found or if the private key is invalid.
pub fn setup_wallet() -> LocalWallet {
    let private_key = load_private_key().expect(
        "Private key required for transaction signing.\n\
         Set PRIVATE_KEY environment variable or create tests/test-config.local.toml\n\
         See tests/test-config.local.toml.example for template.",
    );

    let wallet = LocalWallet::from_private_key(&private_key)
        .expect("Invalid private key format. Expected hex string with optional 0x prefix.");
    eprintln!("✓ Created signer with address: {}", wallet.address());

    wallet
}
