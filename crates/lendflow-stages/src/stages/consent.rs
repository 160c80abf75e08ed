//! Consent and data capture
//!
//! Composite stage: the consent record is the primary artifact; the captured
//! applicant data is logged separately to the interaction channel.

use crate::context::{now, StageContext};
use crate::domain::DomainData;
use crate::registry::{StageError, StageHandler, StageReport};
use lendflow_core::SessionId;
use lendflow_ledger::channels;
use serde_json::json;
use tracing::warn;

pub const CONSENT_REQUIRED: &str = "User consent for KYC and credit check is required.";

pub struct ConsentStage;

impl ConsentStage {
    async fn evaluate(
        &self,
        session: &SessionId,
        data: &mut DomainData,
        ctx: &StageContext,
    ) -> Result<StageReport, StageError> {
        let consent = match data.applicant.consent {
            Some(c) if c.is_complete() => c,
            _ => {
                warn!(session = %session, "consent missing or incomplete");
                return Ok(StageReport::reject(CONSENT_REQUIRED, None));
            }
        };

        let consent_cid = ctx
            .publish(
                channels::CONSENT,
                json!({
                    "stage": self.name(),
                    "action": "collectConsent",
                    "sessionId": session.as_str(),
                    "consent": consent,
                    "timestamp": now(),
                }),
            )
            .await?;

        let applicant = &data.applicant;
        let captured = ctx
            .publish(
                channels::INTERACTION,
                json!({
                    "stage": self.name(),
                    "action": "captureData",
                    "sessionId": session.as_str(),
                    "capturedData": {
                        "income": applicant.income,
                        "employmentType": applicant.employment_type,
                        "loanAmount": applicant.loan_amount,
                        "city": applicant.city,
                    },
                    "timestamp": now(),
                }),
            )
            .await;
        let interaction_cid = match captured {
            Ok(cid) => cid,
            Err(e) => return Ok(StageReport::fatal_with(e, Some(consent_cid))),
        };

        Ok(StageReport::proceed(
            json!({
                "consentGiven": true,
                "dataCollected": true,
                "interactionCid": interaction_cid,
            }),
            consent_cid,
        ))
    }
}

#[async_trait::async_trait]
impl StageHandler for ConsentStage {
    fn name(&self) -> &str {
        "consent"
    }

    fn channel(&self) -> &str {
        channels::CONSENT
    }

    async fn run(&self, session: &SessionId, data: &mut DomainData, ctx: &StageContext) -> StageReport {
        self.evaluate(session, data, ctx)
            .await
            .unwrap_or_else(StageReport::fatal)
    }
}
