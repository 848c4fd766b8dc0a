use alloy_primitives::Address;
use config::{NetworkConfig, NetworkConfigBuilder, NetworkType};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Top-level p3t configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// RPC endpoint url
    pub rpc_url: String,

    /// Network the token is deployed on
    #[serde(default)]
    pub network: NetworkType,

    /// Token address, overriding the network default
    #[serde(default)]
    pub token_address: Option<Address>,

    /// EIP-1193 wallet endpoint, used when no private key is given
    #[serde(default)]
    pub wallet_url: Option<String>,

    /// How often new blocks are scanned for transfers. Defaults to the
    /// network's block time.
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,

    /// Prometheus exporter port for `p3t-watch`
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;

        Ok(config)
    }

    pub fn network_config(&self) -> NetworkConfig {
        let builder = NetworkConfigBuilder::new(self.network);
        match self.token_address {
            Some(token) => builder.token(token).build(),
            None => builder.build(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        match self.poll_interval_ms {
            Some(ms) => Duration::from_millis(ms),
            None => Duration::from_secs(self.network_config().block_time_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(r#"rpc_url = "http://127.0.0.1:8545""#).unwrap();

        assert_eq!(config.network, NetworkType::Sepolia);
        assert_eq!(config.poll_interval(), Duration::from_secs(12));
        assert!(config.wallet_url.is_none());
        assert!(config.metrics_port.is_none());
        assert_eq!(config.network_config(), NetworkConfig::sepolia());
    }

    #[test]
    fn test_token_override() {
        let config: Config = toml::from_str(
            r#"
            rpc_url = "http://127.0.0.1:8545"
            network = "local"
            token_address = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"
            poll_interval_ms = 250
            metrics_port = 9000
            "#,
        )
        .unwrap();

        let network = config.network_config();
        assert_eq!(network.chain_id, 31337);
        assert_eq!(
            network.token,
            address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512")
        );
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.metrics_port, Some(9000));
    }

    #[test]
    fn test_poll_interval_follows_block_time() {
        let config: Config = toml::from_str(
            r#"
            rpc_url = "http://127.0.0.1:8545"
            network = "local"
            "#,
        )
        .unwrap();

        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }
}
