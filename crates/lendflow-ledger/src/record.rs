//! Ledger records, canonical encoding and chain verification

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// `previous_hash` of the first record in every channel.
pub const ZERO_HASH: &str = "0";

/// One sealed entry of a channel.
///
/// `recorded_at` is stamped by the ledger and is not covered by `hash`;
/// payloads carry their own timestamps when they need one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    pub payload: Value,
    pub previous_hash: String,
    pub hash: String,
    pub recorded_at: DateTime<Utc>,
}

impl LedgerRecord {
    /// Seal `payload` on top of `previous_hash`.
    pub fn seal(payload: Value, previous_hash: impl Into<String>) -> Self {
        let previous_hash = previous_hash.into();
        let hash = digest(&payload, &previous_hash);
        Self {
            payload,
            previous_hash,
            hash,
            recorded_at: Utc::now(),
        }
    }

    pub fn computed_hash(&self) -> String {
        digest(&self.payload, &self.previous_hash)
    }

    /// True when the stored hash matches the payload and link.
    pub fn is_intact(&self) -> bool {
        self.computed_hash() == self.hash
    }
}

/// Compact JSON with object keys sorted at every depth.
///
/// Two structurally equal values always produce the same bytes, regardless
/// of the insertion order of their maps.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// `hex(sha256(canonical_json(payload) ++ previous_hash))`
pub fn digest(payload: &Value, previous_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(payload).as_bytes());
    hasher.update(previous_hash.as_bytes());
    hex::encode(hasher.finalize())
}

/// `hex(sha256(canonical_json(value)))`, for fingerprinting documents.
pub fn content_hash(value: &Value) -> String {
    digest(value, "")
}

/// Result of a full chain recomputation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainVerification {
    pub valid: bool,
    pub total: usize,
    /// Records checked before the first failure (or all of them).
    pub verified: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_invalid: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ChainVerification {
    fn broken(total: usize, index: usize, message: String) -> Self {
        Self {
            valid: false,
            total,
            verified: index,
            first_invalid: Some(index),
            message: Some(message),
        }
    }
}

/// Recompute every hash and link. An empty channel is valid.
pub fn verify_chain(records: &[LedgerRecord]) -> ChainVerification {
    let total = records.len();
    let mut expected_previous = ZERO_HASH;

    for (i, record) in records.iter().enumerate() {
        if record.previous_hash != expected_previous {
            return ChainVerification::broken(
                total,
                i,
                format!(
                    "record {} links to {} but previous hash is {}",
                    i, record.previous_hash, expected_previous
                ),
            );
        }
        let computed = record.computed_hash();
        if computed != record.hash {
            return ChainVerification::broken(
                total,
                i,
                format!(
                    "record {} hash mismatch: stored {} computed {}",
                    i, record.hash, computed
                ),
            );
        }
        expected_previous = &record.hash;
    }

    ChainVerification {
        valid: true,
        total,
        verified: total,
        first_invalid: None,
        message: None,
    }
}
