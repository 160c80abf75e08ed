//! Lendflow Core - Shared identifiers, wire protocol, and error handling

pub mod error;
pub mod protocol;
pub mod types;

pub use error::{Error, Result};
pub use protocol::*;
pub use types::*;
