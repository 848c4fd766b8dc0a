//! Network configuration for the token session.
//!
//! Provides chain-specific parameters and the deployed P3T token address for
//! each supported network.

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Network name not recognised
    #[error("Unknown network: {0} (expected `sepolia` or `local`)")]
    UnknownNetwork(String),
}

/// Network type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    #[default]
    Sepolia,
    /// Hardhat / anvil development node
    Local,
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sepolia => f.write_str("sepolia"),
            Self::Local => f.write_str("local"),
        }
    }
}

impl FromStr for NetworkType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sepolia" => Ok(Self::Sepolia),
            "local" | "localhost" | "hardhat" | "anvil" => Ok(Self::Local),
            other => Err(ConfigError::UnknownNetwork(other.to_string())),
        }
    }
}

/// Complete network configuration for the token session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network type
    pub network_type: NetworkType,
    /// Chain ID
    pub chain_id: u64,
    /// Deployed P3T token address
    pub token: Address,
    /// Block time in seconds
    pub block_time_secs: u64,
}

impl NetworkConfig {
    /// Ethereum Sepolia testnet configuration.
    pub const fn sepolia() -> Self {
        Self {
            network_type: NetworkType::Sepolia,
            chain_id: 11155111,
            // https://sepolia.etherscan.io/address/0xdb2A8F53f4e19D2795bB9B592495aDe816656f68
            token: address!("0xdb2A8F53f4e19D2795bB9B592495aDe816656f68"),
            block_time_secs: 12,
        }
    }

    /// Local development chain (hardhat / anvil).
    ///
    /// The token address is the first contract deployed by the default
    /// development account.
    pub const fn local() -> Self {
        Self {
            network_type: NetworkType::Local,
            chain_id: 31337,
            token: address!("0x5FbDB2315678afecb367f032d93F642f64180aa3"),
            block_time_secs: 1,
        }
    }

    /// Create configuration from network type.
    pub const fn from_network_type(network_type: NetworkType) -> Self {
        match network_type {
            NetworkType::Sepolia => Self::sepolia(),
            NetworkType::Local => Self::local(),
        }
    }
}

/// Builder for custom network configurations.
#[derive(Debug, Clone)]
pub struct NetworkConfigBuilder {
    config: NetworkConfig,
}

impl NetworkConfigBuilder {
    /// Start with the defaults of a known network.
    pub const fn new(network_type: NetworkType) -> Self {
        Self {
            config: NetworkConfig::from_network_type(network_type),
        }
    }

    /// Start with Sepolia defaults.
    pub const fn sepolia() -> Self {
        Self::new(NetworkType::Sepolia)
    }

    /// Start with local chain defaults.
    pub const fn local() -> Self {
        Self::new(NetworkType::Local)
    }

    /// Override the token address.
    pub const fn token(mut self, address: Address) -> Self {
        self.config.token = address;
        self
    }

    /// Override the chain id.
    pub const fn chain_id(mut self, chain_id: u64) -> Self {
        self.config.chain_id = chain_id;
        self
    }

    /// Build the network configuration.
    pub const fn build(self) -> NetworkConfig {
        self.config
    }
}
