//! Ledger error types

use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Stored state cannot be trusted. Never repaired automatically.
    #[error("ledger corruption in channel '{channel}': {detail}")]
    Corruption { channel: String, detail: String },

    #[error("invalid channel name: {0:?}")]
    InvalidChannel(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    pub fn corruption(channel: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Corruption {
            channel: channel.into(),
            detail: detail.into(),
        }
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption { .. })
    }
}
