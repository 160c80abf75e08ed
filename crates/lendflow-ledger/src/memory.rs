//! In-process ledger for tests and ephemeral runs

use crate::error::{LedgerError, LedgerResult};
use crate::record::{LedgerRecord, ZERO_HASH};
use crate::{validate_channel, Ledger};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Channels held in memory. One lock guards all channels, which also
/// serializes appends per channel.
#[derive(Default)]
pub struct MemoryLedger {
    channels: Mutex<HashMap<String, Vec<LedgerRecord>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a channel wholesale. Used to simulate tampering.
    pub async fn overwrite(&self, channel: &str, records: Vec<LedgerRecord>) {
        self.channels
            .lock()
            .await
            .insert(channel.to_string(), records);
    }
}

#[async_trait::async_trait]
impl Ledger for MemoryLedger {
    async fn append(&self, channel: &str, payload: Value) -> LedgerResult<LedgerRecord> {
        validate_channel(channel)?;
        let mut guard = self.channels.lock().await;
        let records = guard.entry(channel.to_string()).or_default();

        let previous = match records.last() {
            Some(tail) if !tail.is_intact() => {
                return Err(LedgerError::corruption(
                    channel,
                    format!("tail record {} fails hash check", records.len() - 1),
                ));
            }
            Some(tail) => tail.hash.clone(),
            None => ZERO_HASH.to_string(),
        };

        let record = LedgerRecord::seal(payload, previous);
        records.push(record.clone());
        Ok(record)
    }

    async fn read(&self, channel: &str) -> LedgerResult<Vec<LedgerRecord>> {
        validate_channel(channel)?;
        Ok(self
            .channels
            .lock()
            .await
            .get(channel)
            .cloned()
            .unwrap_or_default())
    }

    async fn channels(&self) -> LedgerResult<Vec<String>> {
        let guard = self.channels.lock().await;
        let mut names: Vec<String> = guard
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}
