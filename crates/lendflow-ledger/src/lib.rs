//! Lendflow Ledger - append-only, hash-chained audit channels
//!
//! Every channel is an ordered list of [`LedgerRecord`]s where each record's
//! hash covers its canonical payload and the hash of the record before it.
//! Stages receive the ledger as an injected `Arc<dyn Ledger>`.

pub mod error;
pub mod file;
pub mod memory;
pub mod record;

pub use error::{LedgerError, LedgerResult};
pub use file::FileLedger;
pub use memory::MemoryLedger;
pub use record::{
    canonical_json, content_hash, digest, verify_chain, ChainVerification, LedgerRecord, ZERO_HASH,
};

use serde_json::Value;

/// Well-known channel names written by the loan workflow.
pub mod channels {
    pub const INTERACTION: &str = "interaction_ledger";
    pub const CONSENT: &str = "consent_ledger";
    pub const IDENTITY: &str = "identity_ledger";
    pub const CREDIT: &str = "credit_ledger";
    pub const UNDERWRITING: &str = "underwriting_ledger";
    pub const LOAN_OFFER: &str = "loan_offer_ledger";
    pub const APPROVAL: &str = "approval_ledger";
    pub const LOAN: &str = "loan_ledger";
    pub const DISBURSEMENT: &str = "disbursement_ledger";
    pub const PAYMENT: &str = "payment_ledger";
}

/// Append-only channel storage.
///
/// Implementations must serialize `append` per channel: the next record's
/// `previous_hash` depends on the complete prior state of the channel.
#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    /// Seal `payload` onto the end of `channel`. Durable once this returns.
    async fn append(&self, channel: &str, payload: Value) -> LedgerResult<LedgerRecord>;

    /// All records of `channel` in insertion order; empty if never written.
    async fn read(&self, channel: &str) -> LedgerResult<Vec<LedgerRecord>>;

    /// Names of all channels that hold at least one record, sorted.
    async fn channels(&self) -> LedgerResult<Vec<String>>;

    /// Full recomputation of the chain. Audit only, not for the hot path.
    async fn audit(&self, channel: &str) -> LedgerResult<ChainVerification> {
        let records = self.read(channel).await?;
        Ok(verify_chain(&records))
    }

    async fn verify(&self, channel: &str) -> LedgerResult<bool> {
        Ok(self.audit(channel).await?.valid)
    }
}

/// Channel names become file names, so they are restricted to a safe alphabet.
pub fn validate_channel(name: &str) -> LedgerResult<()> {
    let ok = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(LedgerError::InvalidChannel(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names() {
        assert!(validate_channel("credit_ledger").is_ok());
        assert!(validate_channel("loan-2024").is_ok());
        assert!(validate_channel("").is_err());
        assert!(validate_channel("../etc/passwd").is_err());
        assert!(validate_channel("a b").is_err());
        assert!(validate_channel(&"x".repeat(65)).is_err());
    }
}
