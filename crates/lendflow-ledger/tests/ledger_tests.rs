//! File ledger behaviour: durability, concurrency, corruption handling

use lendflow_ledger::*;
use serde_json::json;
use std::sync::Arc;

fn open(tmp: &tempfile::TempDir) -> FileLedger {
    FileLedger::open(tmp.path()).unwrap()
}

// ===========================================================================
// Chain shape
// ===========================================================================

#[tokio::test]
async fn first_record_links_to_zero_hash() {
    let tmp = tempfile::TempDir::new().unwrap();
    let ledger = open(&tmp);
    let rec = ledger
        .append(channels::INTERACTION, json!({"intent": "loan_application"}))
        .await
        .unwrap();
    assert_eq!(rec.previous_hash, ZERO_HASH);
    assert_eq!(rec.hash, digest(&rec.payload, ZERO_HASH));
}

#[tokio::test]
async fn appends_form_a_verifiable_chain() {
    let tmp = tempfile::TempDir::new().unwrap();
    let ledger = open(&tmp);
    for n in 0..5 {
        ledger.append("credit_ledger", json!({"n": n})).await.unwrap();
    }
    let records = ledger.read("credit_ledger").await.unwrap();
    assert_eq!(records.len(), 5);
    for pair in records.windows(2) {
        assert_eq!(pair[1].previous_hash, pair[0].hash);
    }
    let report = ledger.audit("credit_ledger").await.unwrap();
    assert!(report.valid);
    assert_eq!(report.total, 5);
}

#[tokio::test]
async fn channels_are_independent_chains() {
    let tmp = tempfile::TempDir::new().unwrap();
    let ledger = open(&tmp);
    let a = ledger.append("approval_ledger", json!({"x": 1})).await.unwrap();
    let b = ledger.append("loan_ledger", json!({"x": 1})).await.unwrap();
    assert_eq!(a.previous_hash, ZERO_HASH);
    assert_eq!(b.previous_hash, ZERO_HASH);
    assert_eq!(
        ledger.channels().await.unwrap(),
        vec!["approval_ledger".to_string(), "loan_ledger".to_string()]
    );
}

// ===========================================================================
// Durability
// ===========================================================================

#[tokio::test]
async fn records_survive_reopen() {
    let tmp = tempfile::TempDir::new().unwrap();
    let first = {
        let ledger = open(&tmp);
        ledger.append("payment_ledger", json!({"amount": 1200})).await.unwrap()
    };

    let reopened = open(&tmp);
    let records = reopened.read("payment_ledger").await.unwrap();
    assert_eq!(records, vec![first.clone()]);

    let next = reopened
        .append("payment_ledger", json!({"amount": 1300}))
        .await
        .unwrap();
    assert_eq!(next.previous_hash, first.hash);
}

#[tokio::test]
async fn channel_file_is_a_json_array() {
    let tmp = tempfile::TempDir::new().unwrap();
    let ledger = open(&tmp);
    ledger.append("identity_ledger", json!({"status": "verified"})).await.unwrap();
    let raw = std::fs::read_to_string(tmp.path().join("identity_ledger.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(parsed.is_array());
    assert_eq!(parsed[0]["payload"]["status"], "verified");
}

// ===========================================================================
// Concurrency
// ===========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_never_fork_the_chain() {
    let tmp = tempfile::TempDir::new().unwrap();
    let ledger = Arc::new(open(&tmp));
    ledger.append("loan_ledger", json!({"seed": 0})).await.unwrap();
    ledger.append("loan_ledger", json!({"seed": 1})).await.unwrap();

    let n = 24;
    let tasks: Vec<_> = (0..n)
        .map(|i| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.append("loan_ledger", json!({"i": i})).await })
        })
        .collect();
    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let records = ledger.read("loan_ledger").await.unwrap();
    assert_eq!(records.len(), n + 2);
    assert!(ledger.verify("loan_ledger").await.unwrap());

    let mut prev: Vec<&str> = records.iter().map(|r| r.previous_hash.as_str()).collect();
    prev.sort();
    prev.dedup();
    assert_eq!(prev.len(), n + 2, "two records share a predecessor");
}

// ===========================================================================
// Corruption
// ===========================================================================

#[tokio::test]
async fn edited_file_fails_verification() {
    let tmp = tempfile::TempDir::new().unwrap();
    let ledger = open(&tmp);
    for n in 0..3 {
        ledger.append("credit_ledger", json!({"score": 700 + n})).await.unwrap();
    }

    let path = tmp.path().join("credit_ledger.json");
    let mut records: Vec<LedgerRecord> =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    records[0].payload = json!({"score": 900});
    std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

    let report = ledger.audit("credit_ledger").await.unwrap();
    assert!(!report.valid);
    assert_eq!(report.first_invalid, Some(0));
    assert!(!ledger.verify("credit_ledger").await.unwrap());
}

#[tokio::test]
async fn tampered_tail_blocks_append() {
    let tmp = tempfile::TempDir::new().unwrap();
    let ledger = open(&tmp);
    ledger.append("approval_ledger", json!({"approved": false})).await.unwrap();

    let path = tmp.path().join("approval_ledger.json");
    let raw = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, raw.replace("false", "true")).unwrap();

    let err = ledger
        .append("approval_ledger", json!({"approved": true}))
        .await
        .unwrap_err();
    assert!(err.is_corruption());
    // State left untouched.
    assert_eq!(ledger.read("approval_ledger").await.unwrap().len(), 1);
}

#[tokio::test]
async fn unparsable_file_is_corruption_not_reset() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("consent_ledger.json");
    std::fs::write(&path, "[{\"payload\": ").unwrap();

    let ledger = open(&tmp);
    let err = ledger.append("consent_ledger", json!({})).await.unwrap_err();
    assert!(matches!(err, LedgerError::Corruption { .. }));
    assert!(ledger.read("consent_ledger").await.unwrap_err().is_corruption());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "[{\"payload\": ");
}

#[tokio::test]
async fn memory_and_file_ledgers_agree_on_hashes() {
    let tmp = tempfile::TempDir::new().unwrap();
    let file = open(&tmp);
    let mem = MemoryLedger::new();
    let payload = json!({"b": [1, 2], "a": "x"});
    let f = file.append("c", payload.clone()).await.unwrap();
    let m = mem.append("c", payload).await.unwrap();
    assert_eq!(f.hash, m.hash);
}
