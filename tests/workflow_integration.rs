//! Integration tests: full loan workflows against a file-backed ledger.

use lendflow::{all_valid, summarize};
use lendflow_agent::{WorkflowCoordinator, WorkflowState};
use lendflow_core::*;
use lendflow_ledger::{channels, FileLedger, Ledger};
use lendflow_remote::mock::{MemoryArtifactStore, ScriptedReasoner};
use lendflow_remote::{RemoteError, RemoteResult, ResilientClient, RetryPolicy};
use lendflow_stages::StageContext;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

fn cooperative(prompt: &str) -> RemoteResult<String> {
    let reply = if prompt.contains("what is the intent") {
        "loanApplication"
    } else if prompt.contains("KYC") {
        r#"{"kycStatus": "verified"}"#
    } else if prompt.contains("Analyze the credit risk") {
        "Sure! ```json\n{\"riskDecision\": \"medium\"}\n```"
    } else if prompt.contains("determine the interest rate") {
        r#"{"interestRate": "11.75%"}"#
    } else if prompt.contains("presented with a loan offer") {
        r#"{"userResponse": "accepted"}"#
    } else if prompt.contains("payment history") {
        r#"{"risk": "low", "message": "Monitoring started."}"#
    } else {
        return Err(RemoteError::RequestFailed("unexpected prompt".into()));
    };
    Ok(reply.to_string())
}

fn coordinator(dir: &Path) -> (Arc<FileLedger>, WorkflowCoordinator) {
    let ledger = Arc::new(FileLedger::open(dir).unwrap());
    let reasoner = ScriptedReasoner::new().respond_with(cooperative);
    let remote = ResilientClient::new(Arc::new(reasoner), Arc::new(MemoryArtifactStore::new()))
        .with_policy(RetryPolicy::from_millis(3, 1, 2));
    let ctx = StageContext::new(ledger.clone(), Arc::new(remote));
    (ledger, WorkflowCoordinator::new(ctx))
}

fn request(name: &str) -> LoanRequest {
    LoanRequest {
        message: format!("{} would like a loan for a two-wheeler", name),
        user_data: ApplicantData {
            name: Some(name.into()),
            income: Some(60_000.0),
            employment_type: Some("self-employed".into()),
            loan_amount: Some(150_000.0),
            city: Some("Jaipur".into()),
            cibil_score: Some(720),
            consent: Some(Consent { kyc: true, credit_check: true }),
            kyc_documents: Some(KycDocuments {
                pan: Some("LMNOP4321Q".into()),
                aadhaar: Some("555566667777".into()),
                ..Default::default()
            }),
        },
    }
}

// ===========================================================================
// End-to-end
// ===========================================================================

#[tokio::test]
async fn approved_workflow_persists_verifiable_channels() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, coordinator) = coordinator(dir.path());

    let response = coordinator.run(request("Kabir")).await.into_response();
    assert_eq!(response.status, LoanStatus::Approved);
    assert_eq!(response.audit_trail.len(), 10);

    let summaries = summarize(ledger.as_ref(), None).await.unwrap();
    assert!(all_valid(&summaries));
    let names: Vec<&str> = summaries.iter().map(|s| s.channel.as_str()).collect();
    for channel in [
        channels::INTERACTION,
        channels::CONSENT,
        channels::IDENTITY,
        channels::CREDIT,
        channels::UNDERWRITING,
        channels::LOAN_OFFER,
        channels::APPROVAL,
        channels::LOAN,
        channels::DISBURSEMENT,
        channels::PAYMENT,
    ] {
        assert!(names.contains(&channel), "missing {}", channel);
        assert!(ledger.channel_path(channel).exists());
    }

    // medium risk on STANDARD-700 is priced at the quoted 11.75
    let offer = ledger.read(channels::UNDERWRITING).await.unwrap();
    assert_eq!(offer[0].payload["offer"]["interestRate"], 11.75);
    assert_eq!(offer[0].payload["offer"]["policyId"], "STANDARD-700");
}

#[tokio::test]
async fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (_, coordinator) = coordinator(dir.path());
        coordinator.run(request("Nisha")).await;
    }
    let (ledger, coordinator) = coordinator(dir.path());
    assert_eq!(ledger.read(channels::LOAN).await.unwrap().len(), 1);

    coordinator.run(request("Arjun")).await;
    let loans = ledger.read(channels::LOAN).await.unwrap();
    assert_eq!(loans.len(), 2);
    assert_eq!(loans[1].previous_hash, loans[0].hash);
    assert!(ledger.verify(channels::LOAN).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_workflows_keep_every_chain_intact() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, coordinator) = coordinator(dir.path());
    let coordinator = Arc::new(coordinator);

    let runs = (0..6).map(|i| {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run(request(&format!("Applicant {}", i))).await })
    });
    let outcomes = futures::future::join_all(runs).await;

    let mut loan_ids = Vec::new();
    for outcome in outcomes {
        let outcome = outcome.unwrap();
        assert!(matches!(outcome.state, WorkflowState::Approved { .. }));
        loan_ids.push(outcome.loan_id().unwrap().to_string());
    }
    loan_ids.sort();
    loan_ids.dedup();
    assert_eq!(loan_ids.len(), 6);

    // intent, captured data and negotiation per run
    assert_eq!(ledger.read(channels::INTERACTION).await.unwrap().len(), 18);
    assert_eq!(ledger.read(channels::LOAN).await.unwrap().len(), 6);
    assert!(all_valid(&summarize(ledger.as_ref(), None).await.unwrap()));
}

// ===========================================================================
// Tampering
// ===========================================================================

fn tamper_first_record(path: &Path) {
    let mut records: Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
    records[0]["payload"]["tampered"] = Value::Bool(true);
    std::fs::write(path, serde_json::to_vec_pretty(&records).unwrap()).unwrap();
}

#[tokio::test]
async fn edited_channel_file_is_reported_broken() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, coordinator) = coordinator(dir.path());
    coordinator.run(request("Farah")).await;

    tamper_first_record(&ledger.channel_path(channels::APPROVAL));

    let summaries = summarize(ledger.as_ref(), None).await.unwrap();
    assert!(!all_valid(&summaries));
    let approval = summaries
        .iter()
        .find(|s| s.channel == channels::APPROVAL)
        .unwrap();
    assert_eq!(approval.verification.first_invalid, Some(0));
    assert!(summaries
        .iter()
        .filter(|s| s.channel != channels::APPROVAL)
        .all(|s| s.verification.valid));
}

#[tokio::test]
async fn corrupt_tail_halts_the_next_workflow() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, coordinator) = coordinator(dir.path());
    coordinator.run(request("Ishaan")).await;

    tamper_first_record(&ledger.channel_path(channels::CREDIT));

    let outcome = coordinator.run(request("Zoya")).await;
    match &outcome.state {
        WorkflowState::Errored { error, trail } => {
            assert_eq!(error.kind(), ErrorKind::LedgerCorruption);
            let steps: Vec<&str> = trail.iter().map(|e| e.step.as_str()).collect();
            assert_eq!(steps, vec!["intent", "consent", "identity"]);
        }
        other => panic!("expected Errored, got {:?}", other),
    }
    assert_eq!(ledger.read(channels::CREDIT).await.unwrap().len(), 1);
    assert_eq!(ledger.read(channels::LOAN).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unparsable_channel_file_is_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, coordinator) = coordinator(dir.path());
    coordinator.run(request("Dev")).await;

    std::fs::write(ledger.channel_path(channels::DISBURSEMENT), b"[{ not json").unwrap();

    let summaries = summarize(ledger.as_ref(), None).await.unwrap();
    let broken: Vec<&str> = summaries
        .iter()
        .filter(|s| !s.verification.valid)
        .map(|s| s.channel.as_str())
        .collect();
    assert_eq!(broken, vec![channels::DISBURSEMENT]);
}
