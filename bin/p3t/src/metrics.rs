//! Prometheus metrics for the wallet session.
//!
//! All metrics are recorded through the [`Metrics`] struct.

use balance::SyncSnapshot;
use client::{ClientError, ErrorKind};
use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Label for the outcome of a wallet or contract operation.
pub fn outcome<T>(result: &Result<T, ClientError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) => match e.kind() {
            ErrorKind::UserRejected => "rejected",
            ErrorKind::ProviderUnavailable => "unavailable",
            ErrorKind::Network => "network",
            ErrorKind::Revert => "revert",
            ErrorKind::Invalid => "invalid",
        },
    }
}

/// Aggregated metrics for the wallet session.
///
/// Metrics are registered with the global metrics registry on creation.
#[derive(Debug, Clone)]
pub struct Metrics {
    _private: (),
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance and register all metric descriptions.
    pub fn new() -> Self {
        Self::register_descriptions();
        Self { _private: () }
    }

    fn register_descriptions() {
        describe_counter!(
            "p3t_connects_total",
            "Wallet connection attempts by outcome"
        );
        describe_counter!("p3t_transfers_total", "Token transfers by outcome");
        describe_counter!(
            "p3t_balance_updates_total",
            "Balance snapshots published by the synchronizer"
        );

        describe_gauge!("p3t_balance", "Current balance of the connected account, in tokens");
        describe_gauge!(
            "p3t_active_listeners",
            "Transfer listeners held by the synchronizer"
        );
    }

    pub fn record_connect<T>(&self, result: &Result<T, ClientError>) {
        counter!("p3t_connects_total", "outcome" => outcome(result)).increment(1);
    }

    pub fn record_transfer<T>(&self, result: &Result<T, ClientError>) {
        counter!("p3t_transfers_total", "outcome" => outcome(result)).increment(1);
    }

    /// Record a published synchronizer snapshot.
    pub fn record_snapshot(&self, snapshot: &SyncSnapshot, listening: bool) {
        gauge!("p3t_active_listeners").set(if listening { 1.0 } else { 0.0 });

        if let Some(balance) = snapshot.balance.as_ref() {
            counter!("p3t_balance_updates_total").increment(1);
            // Display form, precision loss is fine for a gauge.
            gauge!("p3t_balance").set(balance.display().parse::<f64>().unwrap_or_default());
        }
    }
}

/// Install the Prometheus metrics exporter and start the HTTP server.
///
/// Returns an error if the server fails to bind to the specified port.
pub fn install_prometheus_exporter(port: u16) -> eyre::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::net::SocketAddr;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| eyre::eyre!("Failed to install Prometheus exporter: {}", e))?;

    Ok(())
}
