//! HTTP wire protocol for the loan workflow
//!
//! Client → Server:
//!   POST /loan     { "message": "I need a loan", "userData": { ... } }
//!   POST /payment  { "loanId": "...", "paymentData": { "amount": 1200.0, "paymentDate": "..." } }
//!
//! Server → Client:
//!   { "status": "approved", "loanId": "...", "auditTrail": [ { "step": "intent", "contentId": "..." } ] }
//!   { "status": "rejected", "reason": "KYC failed", "auditTrail": [ ... ] }
//!   { "status": "error", "reason": "...", "errorKind": "rate_limited", "auditTrail": [ ... ] }

use crate::types::ContentId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Inbound loan application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanRequest {
    pub message: String,
    #[serde(default)]
    pub user_data: ApplicantData,
}

/// Structured applicant data captured with the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cibil_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent: Option<Consent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kyc_documents: Option<KycDocuments>,
}

/// Consent flags required before any personal data is processed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Consent {
    #[serde(default)]
    pub kyc: bool,
    #[serde(default)]
    pub credit_check: bool,
}

impl Consent {
    pub fn is_complete(&self) -> bool {
        self.kyc && self.credit_check
    }
}

/// Identity documents: plain numbers, or base64 card images.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KycDocuments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aadhaar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan_card: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aadhaar_card: Option<String>,
}

impl KycDocuments {
    pub fn has_images(&self) -> bool {
        self.pan_card.is_some() || self.aadhaar_card.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.pan.is_none() && self.aadhaar.is_none() && !self.has_images()
    }
}

/// Post-disbursement EMI payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub loan_id: String,
    pub payment_data: PaymentData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentData {
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<String>,
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// One executed stage and the artifact it produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub step: String,
    pub content_id: ContentId,
}

impl AuditEntry {
    pub fn new(step: impl Into<String>, content_id: ContentId) -> Self {
        Self {
            step: step.into(),
            content_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Approved,
    Rejected,
    Error,
}

/// Classification of a failed run, exposed to callers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Precondition,
    RateLimited,
    Remote,
    UnparsableResponse,
    LedgerCorruption,
    Ledger,
    Internal,
}

/// Final response of a workflow run. The audit trail is always present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoanResponse {
    pub status: LoanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_id: Option<String>,
    pub audit_trail: Vec<AuditEntry>,
}

impl LoanResponse {
    pub fn approved(loan_id: Option<String>, audit_trail: Vec<AuditEntry>) -> Self {
        Self {
            status: LoanStatus::Approved,
            reason: None,
            error_kind: None,
            loan_id,
            audit_trail,
        }
    }

    pub fn rejected(reason: impl Into<String>, audit_trail: Vec<AuditEntry>) -> Self {
        Self {
            status: LoanStatus::Rejected,
            reason: Some(reason.into()),
            error_kind: None,
            loan_id: None,
            audit_trail,
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>, audit_trail: Vec<AuditEntry>) -> Self {
        Self {
            status: LoanStatus::Error,
            reason: Some(message.into()),
            error_kind: Some(kind),
            loan_id: None,
            audit_trail,
        }
    }
}
