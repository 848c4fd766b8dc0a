//! Configuration types for the P3T wallet.
//!
//! This crate provides:
//! - Network configurations (Sepolia, local development chain)
//! - The deployed token address for each network
//! - Builder overrides for custom deployments

pub mod network;

pub use network::{ConfigError, NetworkConfig, NetworkConfigBuilder, NetworkType};
