//! User-facing notices.

use alloy_primitives::{Address, TxHash};
use client::{ClientError, ErrorKind};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// A short message for the user, with optional detail for logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub title: &'static str,
    pub detail: Option<String>,
}

impl Notice {
    /// A declined prompt is neutral; everything else is an error.
    pub fn from_error(err: &ClientError) -> Self {
        match err.kind() {
            ErrorKind::UserRejected => Self {
                severity: Severity::Info,
                title: "Rejected",
                detail: None,
            },
            ErrorKind::ProviderUnavailable => Self {
                severity: Severity::Error,
                title: "Install a wallet",
                detail: Some(err.to_string()),
            },
            ErrorKind::Network | ErrorKind::Revert | ErrorKind::Invalid => Self {
                severity: Severity::Error,
                title: "Failed",
                detail: Some(err.to_string()),
            },
        }
    }

    pub fn connected(account: Address) -> Self {
        Self {
            severity: Severity::Success,
            title: "Connected",
            detail: Some(format_account(account)),
        }
    }

    pub fn sent(tx_hash: TxHash) -> Self {
        Self {
            severity: Severity::Success,
            title: "Sent",
            detail: Some(tx_hash.to_string()),
        }
    }

    pub const fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.title, detail),
            None => f.write_str(self.title),
        }
    }
}

/// Shortened checksummed form, `0xf39F...2266`.
pub fn format_account(account: Address) -> String {
    let full = account.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
