//! Error types for the gateway and configuration layers

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("authentication failed: {reason}")]
    AuthFailed { reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn auth_failed(reason: impl Into<String>) -> Self {
        Self::AuthFailed {
            reason: reason.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }
}
