//! Error taxonomy shared by the wallet session and contract calls.
//!
//! Every failure crossing a wallet, node or contract boundary is converted
//! into a [`ClientError`] so callers only ever branch on an [`ErrorKind`].

use alloy_provider::PendingTransactionError;
use alloy_transport::TransportError;
use thiserror::Error;

/// EIP-1193: the user rejected the request.
pub const USER_REJECTED_CODE: i64 = 4001;

/// EIP-1193: the requested method and/or account has not been authorized.
pub const UNAUTHORIZED_CODE: i64 = 4100;

/// JSON-RPC code returned by geth-style nodes for `execution reverted`.
pub const EXECUTION_REVERTED_CODE: i64 = 3;

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No wallet present or reachable. Fatal to the operation.
    ProviderUnavailable,
    /// The user declined a wallet prompt. Benign.
    UserRejected,
    /// Transient transport or node failure. Safe to retry.
    Network,
    /// The chain rejected the call. Inputs must change before retrying.
    Revert,
    /// Malformed local input or configuration.
    Invalid,
}

#[derive(Error, Debug)]
pub enum ClientError {
    /// Error parsing or validating URLs
    #[error("Invalid RPC URL: {0}")]
    InvalidUrl(String),

    /// Error with private key
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Malformed user input (recipient, amount)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No wallet configured, or the wallet endpoint cannot be reached
    #[error("Wallet unavailable: {0}")]
    ProviderUnavailable(String),

    /// The wallet prompt was declined
    #[error("Request rejected by user")]
    UserRejected,

    /// Transport or node failure
    #[error("Network error: {0}")]
    Network(String),

    /// The call reverted on chain or in simulation
    #[error("Execution reverted: {0}")]
    Revert(String),
}

impl ClientError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl(_) | Self::InvalidPrivateKey(_) | Self::InvalidInput(_) => {
                ErrorKind::Invalid
            }
            Self::ProviderUnavailable(_) => ErrorKind::ProviderUnavailable,
            Self::UserRejected => ErrorKind::UserRejected,
            Self::Network(_) => ErrorKind::Network,
            Self::Revert(_) => ErrorKind::Revert,
        }
    }

    /// Only network failures may be retried verbatim.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Classify a JSON-RPC error object returned by a wallet or node.
    pub fn from_rpc_error(code: i64, message: &str) -> Self {
        let lower = message.to_ascii_lowercase();

        if code == USER_REJECTED_CODE
            || code == UNAUTHORIZED_CODE
            || lower.contains("user rejected")
            || lower.contains("user denied")
            || lower.contains("rejected by user")
        {
            return Self::UserRejected;
        }

        if code == EXECUTION_REVERTED_CODE || lower.contains("revert") {
            return Self::Revert(message.to_string());
        }

        Self::Network(format!("JSON-RPC error {code}: {message}"))
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) => Self::from_rpc_error(payload.code, &payload.message),
            None => Self::Network(err.to_string()),
        }
    }
}

impl From<PendingTransactionError> for ClientError {
    fn from(err: PendingTransactionError) -> Self {
        match err {
            PendingTransactionError::TransportError(err) => err.into(),
            other => Self::Network(other.to_string()),
        }
    }
}

impl From<alloy_contract::Error> for ClientError {
    fn from(err: alloy_contract::Error) -> Self {
        match err {
            alloy_contract::Error::TransportError(err) => err.into(),
            alloy_contract::Error::PendingTransactionError(err) => err.into(),
            // Undecodable return data, e.g. no contract at the address.
            other => Self::Revert(other.to_string()),
        }
    }
}
