//! Identity verification (KYC)

use crate::context::{now, StageContext};
use crate::domain::{DomainData, KycStatus, KycVerification};
use crate::registry::{StageError, StageHandler, StageReport};
use lendflow_core::{KycDocuments, SessionId};
use lendflow_ledger::{channels, content_hash};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;
use tracing::{info, warn};

pub struct IdentityStage;

fn pan_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").ok()).as_ref()
}

fn aadhaar_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{12}$").ok()).as_ref()
}

pub fn is_valid_pan(pan: &str) -> bool {
    pan_pattern().is_some_and(|re| re.is_match(pan.trim()))
}

/// Twelve digits; spaces between groups are tolerated.
pub fn is_valid_aadhaar(aadhaar: &str) -> bool {
    let digits: String = aadhaar.chars().filter(|c| !c.is_whitespace()).collect();
    aadhaar_pattern().is_some_and(|re| re.is_match(&digits))
}

/// Format failures on plain-text numbers, if any were supplied.
fn format_problems(docs: &KycDocuments) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if let Some(pan) = &docs.pan {
        if !is_valid_pan(pan) {
            problems.push("PAN format invalid");
        }
    }
    if let Some(aadhaar) = &docs.aadhaar {
        if !is_valid_aadhaar(aadhaar) {
            problems.push("Aadhaar format invalid");
        }
    }
    problems
}

impl IdentityStage {
    fn prompt(docs: &KycDocuments) -> String {
        if docs.has_images() {
            let mut prompt = String::from(
                "You are given KYC images encoded as base64. Extract the PAN number and Aadhaar number \
                 where possible, then validate formats: PAN -> [A-Z]{5}[0-9]{4}[A-Z], Aadhaar -> 12 digits. \
                 Return a JSON object: { \"kycStatus\": \"verified\"|\"rejected\", \"pan\": \"<extracted or empty>\", \
                 \"aadhaar\": \"<extracted or empty>\", \"reason\": \"explain\" }.",
            );
            if let Some(img) = &docs.pan_card {
                prompt.push_str("\nPAN card image: ");
                prompt.push_str(img);
            }
            if let Some(img) = &docs.aadhaar_card {
                prompt.push_str("\nAadhaar card image: ");
                prompt.push_str(img);
            }
            prompt
        } else {
            format!(
                "Please verify the following KYC documents. PAN: {:?}, Aadhaar: {:?}. A valid PAN has the \
                 format [A-Z]{{5}}[0-9]{{4}}[A-Z]{{1}}. A valid Aadhaar has 12 digits. Respond with a JSON \
                 object containing a \"kycStatus\" key which can be \"verified\" or \"rejected\", and a \
                 \"reason\" key explaining why. If both are valid, the status is \"verified\".",
                docs.pan.as_deref().unwrap_or(""),
                docs.aadhaar.as_deref().unwrap_or("")
            )
        }
    }

    async fn evaluate(
        &self,
        session: &SessionId,
        data: &mut DomainData,
        ctx: &StageContext,
    ) -> Result<StageReport, StageError> {
        let docs = match &data.applicant.kyc_documents {
            Some(d) if !d.is_empty() => d.clone(),
            _ => return Err(StageError::validation("KYC documents are required")),
        };

        let verdict = ctx.remote.reason_json(Self::prompt(&docs)).await?;
        let mut status = match verdict.get("kycStatus").and_then(Value::as_str) {
            Some(s) if s.eq_ignore_ascii_case("verified") => KycStatus::Verified,
            Some(_) => KycStatus::Rejected,
            None => return Err(StageError::unparsable("identity reply has no kycStatus")),
        };
        let mut reason = verdict
            .get("reason")
            .and_then(Value::as_str)
            .map(str::to_string);

        let problems = format_problems(&docs);
        if status == KycStatus::Verified && !problems.is_empty() {
            warn!(session = %session, ?problems, "overriding verified KYC on format rules");
            status = KycStatus::Rejected;
            reason = Some(problems.join("; "));
        }

        let extracted_pan = non_empty(&verdict, "pan").or(docs.pan.clone());
        let extracted_aadhaar = non_empty(&verdict, "aadhaar").or(docs.aadhaar.clone());
        let docs_json = serde_json::to_value(&docs).map_err(|e| StageError::Internal(e.to_string()))?;

        let cid = ctx
            .publish(
                channels::IDENTITY,
                json!({
                    "stage": self.name(),
                    "action": "verifyKYC",
                    "sessionId": session.as_str(),
                    "kycDocumentHash": content_hash(&docs_json),
                    "kycStatus": status,
                    "reason": reason,
                    "extracted": { "pan": extracted_pan, "aadhaar": extracted_aadhaar },
                    "timestamp": now(),
                }),
            )
            .await?;

        info!(session = %session, ?status, "kyc evaluated");
        let verification = KycVerification { status, reason };
        data.kyc = Some(verification.clone());

        if !verification.is_verified() {
            return Ok(StageReport::reject("KYC failed", Some(cid)));
        }
        Ok(StageReport::proceed(json!({ "kycStatus": status }), cid))
    }
}

fn non_empty(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

#[async_trait::async_trait]
impl StageHandler for IdentityStage {
    fn name(&self) -> &str {
        "identity"
    }

    fn channel(&self) -> &str {
        channels::IDENTITY
    }

    async fn run(&self, session: &SessionId, data: &mut DomainData, ctx: &StageContext) -> StageReport {
        self.evaluate(session, data, ctx)
            .await
            .unwrap_or_else(StageReport::fatal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pan_format() {
        assert!(is_valid_pan("ABCDE1234F"));
        assert!(!is_valid_pan("abcde1234f"));
        assert!(!is_valid_pan("ABCD1234F"));
        assert!(!is_valid_pan("ABCDE12345"));
    }

    #[test]
    fn aadhaar_format() {
        assert!(is_valid_aadhaar("123412341234"));
        assert!(is_valid_aadhaar("1234 1234 1234"));
        assert!(!is_valid_aadhaar("12341234123"));
        assert!(!is_valid_aadhaar("12341234123X"));
    }

    #[test]
    fn images_only_have_no_format_problems() {
        let docs = KycDocuments {
            pan_card: Some("aGVsbG8=".into()),
            ..Default::default()
        };
        assert!(format_problems(&docs).is_empty());
    }
}
