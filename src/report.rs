//! Channel summaries and human-readable ledger output

use lendflow_ledger::{ChainVerification, Ledger, LedgerRecord, LedgerResult};
use serde::Serialize;
use tracing::warn;

const MAX_PAYLOAD_CHARS: usize = 160;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSummary {
    pub channel: String,
    pub verification: ChainVerification,
}

/// Verify every channel in `ledger`.
///
/// A channel that cannot be read because it is corrupt is reported as broken
/// rather than aborting the whole audit.
pub async fn summarize(ledger: &dyn Ledger, only: Option<&str>) -> LedgerResult<Vec<ChannelSummary>> {
    let channels = match only {
        Some(channel) => vec![channel.to_string()],
        None => ledger.channels().await?,
    };

    let mut summaries = Vec::with_capacity(channels.len());
    for channel in channels {
        let verification = match ledger.audit(&channel).await {
            Ok(v) => v,
            Err(e) if e.is_corruption() => {
                warn!(channel = %channel, error = %e, "channel unreadable");
                ChainVerification {
                    valid: false,
                    total: 0,
                    verified: 0,
                    first_invalid: None,
                    message: Some(e.to_string()),
                }
            }
            Err(e) => return Err(e),
        };
        summaries.push(ChannelSummary { channel, verification });
    }
    Ok(summaries)
}

pub fn all_valid(summaries: &[ChannelSummary]) -> bool {
    summaries.iter().all(|s| s.verification.valid)
}

pub fn format_summary(summaries: &[ChannelSummary]) -> String {
    let mut out = String::new();
    for s in summaries {
        let v = &s.verification;
        if v.valid {
            out.push_str(&format!("ok      {:<24} {} records\n", s.channel, v.total));
        } else {
            out.push_str(&format!(
                "BROKEN  {:<24} {}/{} verified\n",
                s.channel, v.verified, v.total
            ));
            if let Some(message) = &v.message {
                out.push_str(&format!("        {}\n", message));
            }
        }
    }
    out
}

fn short(hash: &str) -> &str {
    if hash.len() > 12 { &hash[..12] } else { hash }
}

/// One block per record; payloads are truncated unless `raw`.
pub fn format_records(channel: &str, records: &[LedgerRecord], raw: bool) -> String {
    let mut out = format!("═══ {} ({} records) ═══\n", channel, records.len());
    for (i, record) in records.iter().enumerate() {
        let marker = if record.is_intact() { "" } else { "  [hash mismatch]" };
        out.push_str(&format!(
            "\n#{} {} {} <- {}{}\n",
            i,
            record.recorded_at.to_rfc3339(),
            short(&record.hash),
            short(&record.previous_hash),
            marker
        ));
        let payload = record.payload.to_string();
        if raw || payload.chars().count() <= MAX_PAYLOAD_CHARS {
            out.push_str(&format!("   {}\n", payload));
        } else {
            let head: String = payload.chars().take(MAX_PAYLOAD_CHARS).collect();
            out.push_str(&format!("   {}…\n", head));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendflow_ledger::MemoryLedger;
    use serde_json::json;

    #[tokio::test]
    async fn summary_flags_tampered_channel() {
        let ledger = MemoryLedger::new();
        ledger.append("credit_ledger", json!({"risk": "low"})).await.unwrap();
        ledger.append("approval_ledger", json!({"status": "approved"})).await.unwrap();
        ledger.append("approval_ledger", json!({"status": "rejected"})).await.unwrap();

        let mut records = ledger.read("approval_ledger").await.unwrap();
        records[1].payload = json!({"status": "approved"});
        ledger.overwrite("approval_ledger", records).await;

        let summaries = summarize(&ledger, None).await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert!(!all_valid(&summaries));

        let text = format_summary(&summaries);
        assert!(text.contains("BROKEN  approval_ledger"));
        assert!(text.contains("ok      credit_ledger"));
    }

    #[tokio::test]
    async fn single_channel_summary() {
        let ledger = MemoryLedger::new();
        ledger.append("loan_ledger", json!({"loanId": "l-1"})).await.unwrap();
        let summaries = summarize(&ledger, Some("loan_ledger")).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert!(all_valid(&summaries));
        assert_eq!(summaries[0].verification.total, 1);
    }

    #[tokio::test]
    async fn records_are_truncated_unless_raw() {
        let ledger = MemoryLedger::new();
        let long = "x".repeat(400);
        ledger.append("interaction_ledger", json!({ "message": long })).await.unwrap();
        let records = ledger.read("interaction_ledger").await.unwrap();

        let short_text = format_records("interaction_ledger", &records, false);
        assert!(short_text.starts_with("═══ interaction_ledger (1 records) ═══"));
        assert!(short_text.contains('…'));
        assert!(!short_text.contains("[hash mismatch]"));

        let raw_text = format_records("interaction_ledger", &records, true);
        assert!(raw_text.contains(&long));
    }
}
