//! Typed domain data threaded between stages

use lendflow_core::{ApplicantData, ContentId, LoanRequest};
use serde::{Deserialize, Serialize};

/// Everything a workflow run knows so far. Each stage reads what upstream
/// stages attached and attaches its own result.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainData {
    pub message: String,
    pub applicant: ApplicantData,
    pub intent: Option<String>,
    pub kyc: Option<KycVerification>,
    pub credit: Option<CreditAssessment>,
    pub offer: Option<LoanOffer>,
    pub negotiated: Option<NegotiatedOffer>,
    pub approval: Option<ApprovalDecision>,
    pub sanction: Option<SanctionLetter>,
    pub disbursement: Option<DisbursementReceipt>,
    pub monitoring: Option<PaymentReceipt>,
}

impl DomainData {
    pub fn new(request: LoanRequest) -> Self {
        Self {
            message: request.message,
            applicant: request.user_data,
            ..Default::default()
        }
    }

    pub fn loan_id(&self) -> Option<&str> {
        self.sanction.as_ref().map(|s| s.loan_id.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    Verified,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KycVerification {
    pub status: KycStatus,
    pub reason: Option<String>,
}

impl KycVerification {
    pub fn is_verified(&self) -> bool {
        self.status == KycStatus::Verified
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreditAssessment {
    pub cibil_score: u32,
    pub risk: RiskLevel,
    pub policy_id: Option<String>,
}

impl CreditAssessment {
    pub fn risk_acceptable(&self) -> bool {
        self.risk != RiskLevel::High
    }
}

/// Priced offer produced by underwriting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoanOffer {
    pub loan_amount: f64,
    pub interest_rate: f64,
    pub term_months: u32,
    pub policy_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OfferResponse {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NegotiatedOffer {
    #[serde(flatten)]
    pub offer: LoanOffer,
    pub user_response: OfferResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl NegotiatedOffer {
    pub fn is_accepted(&self) -> bool {
        self.user_response == OfferResponse::Accepted
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalDecision {
    pub status: ApprovalStatus,
    pub reason: Option<String>,
    pub approval_cid: ContentId,
}

impl ApprovalDecision {
    pub fn is_approved(&self) -> bool {
        self.status == ApprovalStatus::Approved
    }
}

/// Signed sanction letter. `digital_signature` covers every other field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SanctionLetter {
    pub loan_id: String,
    pub session_id: String,
    pub borrower: String,
    pub loan_amount: f64,
    pub interest_rate: f64,
    pub term_months: u32,
    pub policy_id: String,
    pub sanction_date: String,
    pub digital_signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisbursementReceipt {
    pub disbursement_status: String,
    pub transaction_id: String,
    pub monthly_emi: f64,
    pub disbursement_cid: ContentId,
}

/// Result of logging one EMI payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub payment_status: String,
    pub payment_id: String,
    pub payment_cid: ContentId,
    pub risk_prediction: RiskPrediction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RiskPrediction {
    pub risk: RiskLevel,
    #[serde(default)]
    pub message: String,
}
