//! Approval - conjunction of upstream decisions

use crate::context::{now, StageContext};
use crate::domain::{ApprovalDecision, ApprovalStatus, DomainData};
use crate::registry::{StageError, StageHandler, StageReport};
use lendflow_core::SessionId;
use lendflow_ledger::channels;
use serde_json::{json, Value};
use tracing::info;

pub struct ApprovalStage;

/// First unmet rule, in evaluation order.
pub fn unmet_rule(data: &DomainData) -> Option<&'static str> {
    if !data.kyc.as_ref().is_some_and(|k| k.is_verified()) {
        Some("KYC not verified")
    } else if !data.credit.as_ref().is_some_and(|c| c.risk_acceptable()) {
        Some("Credit risk too high")
    } else if !data.negotiated.as_ref().is_some_and(|n| n.is_accepted()) {
        Some("Loan offer not accepted by user")
    } else {
        None
    }
}

impl ApprovalStage {
    async fn evaluate(
        &self,
        session: &SessionId,
        data: &mut DomainData,
        ctx: &StageContext,
    ) -> Result<StageReport, StageError> {
        let reason = unmet_rule(data);
        let status = if reason.is_some() {
            ApprovalStatus::Rejected
        } else {
            ApprovalStatus::Approved
        };
        let final_offer = match status {
            ApprovalStatus::Approved => serde_json::to_value(&data.negotiated)
                .map_err(|e| StageError::Internal(e.to_string()))?,
            ApprovalStatus::Rejected => Value::Null,
        };

        let cid = ctx
            .publish(
                channels::APPROVAL,
                json!({
                    "stage": self.name(),
                    "action": "executeApproval",
                    "sessionId": session.as_str(),
                    "approvalStatus": status,
                    "reason": reason,
                    "finalOffer": final_offer,
                    "approvedAt": now(),
                }),
            )
            .await?;

        info!(session = %session, ?status, "approval decided");
        data.approval = Some(ApprovalDecision {
            status,
            reason: reason.map(str::to_string),
            approval_cid: cid.clone(),
        });

        match reason {
            Some(r) => Ok(StageReport::reject(r, Some(cid))),
            None => Ok(StageReport::proceed(
                json!({ "approvalStatus": status, "approvalCid": cid }),
                cid,
            )),
        }
    }
}

#[async_trait::async_trait]
impl StageHandler for ApprovalStage {
    fn name(&self) -> &str {
        "approval"
    }

    fn channel(&self) -> &str {
        channels::APPROVAL
    }

    async fn run(&self, session: &SessionId, data: &mut DomainData, ctx: &StageContext) -> StageReport {
        self.evaluate(session, data, ctx)
            .await
            .unwrap_or_else(StageReport::fatal)
    }
}
