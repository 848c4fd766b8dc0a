//! Remote wallet that speaks EIP-1193 JSON-RPC over HTTP.
//!
//! Desktop wallets (and browser-wallet bridges) expose the same request
//! surface a dapp sees in the browser. Account access goes through
//! `eth_requestAccounts`, which makes the wallet prompt the user; signing
//! happens inside the wallet when transactions are sent through
//! [`RemoteWallet::signer_provider`].

use crate::{error::ClientError, parse_url, wallet::WalletProvider};
use alloy_primitives::{Address, U64};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

/// A wallet reached over HTTP JSON-RPC.
///
/// # Example
///
/// ```ignore
/// let wallet = RemoteWallet::new("http://127.0.0.1:1248");
/// let accounts = wallet.request_accounts().await?;
/// ```
#[derive(Debug, Clone)]
pub struct RemoteWallet {
    client: reqwest::Client,
    url: String,
}

impl RemoteWallet {
    /// Creates a new remote wallet for the given endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Creates a new remote wallet with a custom HTTP client.
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Returns the wallet endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Chain the wallet is currently pointed at.
    pub async fn chain_id(&self) -> Result<u64, ClientError> {
        let chain_id: U64 = self.request("eth_chainId", NO_PARAMS).await?;
        Ok(chain_id.to::<u64>())
    }

    /// Provider whose transactions are signed by the wallet.
    pub fn signer_provider(&self) -> Result<DynProvider, ClientError> {
        let url = parse_url(&self.url)?;
        Ok(ProviderBuilder::new().connect_http(url).erased())
    }

    async fn request<P, R>(&self, method: &'static str, params: P) -> Result<R, ClientError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        debug!(method, url = %self.url, "Sending wallet request");

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ClientError::ProviderUnavailable(format!("no wallet at {}: {e}", self.url))
                } else {
                    ClientError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(ClientError::Network(format!(
                "wallet returned {status}: {body}"
            )));
        }

        let rpc_response: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        rpc_response.into_result()
    }
}

impl WalletProvider for RemoteWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ClientError> {
        self.request("eth_requestAccounts", NO_PARAMS).await
    }
}

const NO_PARAMS: [(); 0] = [];

#[derive(Debug, Serialize)]
struct JsonRpcRequest<T> {
    jsonrpc: &'static str,
    method: &'static str,
    params: T,
    id: u32,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl<T> JsonRpcResponse<T> {
    fn into_result(self) -> Result<T, ClientError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(ClientError::from_rpc_error(error.code, &error.message)),
            (Some(result), None) => Ok(result),
            (None, None) => Err(ClientError::Network(
                "wallet response carried neither result nor error".to_string(),
            )),
        }
    }
}
