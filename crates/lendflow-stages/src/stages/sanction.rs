//! Sanction letter generation and signing

use crate::context::{now, StageContext};
use crate::domain::{DomainData, SanctionLetter};
use crate::registry::{StageError, StageHandler, StageReport};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lendflow_core::SessionId;
use lendflow_ledger::{canonical_json, channels};
use ring::hmac;
use serde_json::{json, Value};
use tracing::info;

pub const NOT_APPROVED: &str = "Cannot generate documents for a non-approved loan.";

pub struct SanctionStage;

/// Every field except the signature itself.
fn signing_payload(letter: &SanctionLetter) -> Result<String, StageError> {
    let mut value = serde_json::to_value(letter).map_err(|e| StageError::Internal(e.to_string()))?;
    if let Value::Object(map) = &mut value {
        map.remove("digitalSignature");
    }
    Ok(canonical_json(&value))
}

/// Base64 HMAC-SHA256 over the canonical letter.
pub fn sign_letter(letter: &SanctionLetter, key: &str) -> Result<String, StageError> {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key.as_bytes());
    let tag = hmac::sign(&key, signing_payload(letter)?.as_bytes());
    Ok(STANDARD.encode(tag.as_ref()))
}

pub fn verify_letter(letter: &SanctionLetter, key: &str) -> bool {
    let Ok(signature) = STANDARD.decode(&letter.digital_signature) else {
        return false;
    };
    let Ok(payload) = signing_payload(letter) else {
        return false;
    };
    let key = hmac::Key::new(hmac::HMAC_SHA256, key.as_bytes());
    hmac::verify(&key, payload.as_bytes(), &signature).is_ok()
}

impl SanctionStage {
    async fn evaluate(
        &self,
        session: &SessionId,
        data: &mut DomainData,
        ctx: &StageContext,
    ) -> Result<StageReport, StageError> {
        if !data.approval.as_ref().is_some_and(|a| a.is_approved()) {
            return Err(StageError::precondition(NOT_APPROVED));
        }
        let offer = data
            .negotiated
            .as_ref()
            .map(|n| n.offer.clone())
            .ok_or_else(|| StageError::precondition("approved loan has no final offer"))?;

        let mut letter = SanctionLetter {
            loan_id: uuid::Uuid::new_v4().to_string(),
            session_id: session.to_string(),
            borrower: data
                .applicant
                .name
                .clone()
                .unwrap_or_else(|| "unnamed applicant".into()),
            loan_amount: offer.loan_amount,
            interest_rate: offer.interest_rate,
            term_months: offer.term_months,
            policy_id: offer.policy_id,
            sanction_date: now(),
            digital_signature: String::new(),
        };
        letter.digital_signature = sign_letter(&letter, &ctx.settings.signing_key)?;

        let mut document = serde_json::to_value(&letter).map_err(|e| StageError::Internal(e.to_string()))?;
        if let Value::Object(map) = &mut document {
            map.insert("stage".into(), json!(self.name()));
            map.insert("action".into(), json!("generateSanctionLetter"));
            map.insert("lender".into(), json!(ctx.settings.lender_name));
        }
        let cid = ctx.publish(channels::LOAN, document).await?;

        info!(session = %session, loan_id = %letter.loan_id, "sanction letter issued");
        let loan_id = letter.loan_id.clone();
        data.sanction = Some(letter);
        Ok(StageReport::proceed(
            json!({ "loanId": loan_id, "sanctionCid": cid }),
            cid,
        ))
    }
}

#[async_trait::async_trait]
impl StageHandler for SanctionStage {
    fn name(&self) -> &str {
        "sanction"
    }

    fn channel(&self) -> &str {
        channels::LOAN
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

    fn letter() -> SanctionLetter {
        SanctionLetter {
            loan_id: "loan-1".into(),
            session_id: "s-1".into(),
            borrower: "Asha".into(),
            loan_amount: 300_000.0,
            interest_rate: 9.5,
            term_months: 36,
            policy_id: "PREMIUM-750".into(),
            sanction_date: "2024-01-01T00:00:00Z".into(),
            digital_signature: String::new(),
        }
    }

    #[test]
    fn signature_round_trip() {
        let mut l = letter();
        l.digital_signature = sign_letter(&l, "k1").unwrap();
        assert!(verify_letter(&l, "k1"));
        assert!(!verify_letter(&l, "k2"));
    }

    #[test]
    fn tampered_letter_fails_verification() {
        let mut l = letter();
        l.digital_signature = sign_letter(&l, "k1").unwrap();
        l.loan_amount = 900_000.0;
        assert!(!verify_letter(&l, "k1"));
    }

    #[test]
    fn garbage_signature_is_rejected() {
        let mut l = letter();
        l.digital_signature = "not base64!!".into();
        assert!(!verify_letter(&l, "k1"));
    }
}
