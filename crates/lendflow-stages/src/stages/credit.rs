//! Credit risk analysis

use crate::context::{now, StageContext};
use crate::domain::{CreditAssessment, DomainData, RiskLevel};
use crate::registry::{StageError, StageHandler, StageReport};
use lendflow_core::SessionId;
use lendflow_ledger::channels;
use serde_json::{json, Value};
use tracing::{info, warn};

pub struct CreditAnalysisStage;

impl CreditAnalysisStage {
    fn prompt(score: u32, policy: &Value) -> String {
        format!(
            "Analyze the credit risk for a user with CIBIL score {}. The applicable policy is: {}. \
             Based on this, is the risk 'low', 'medium', or 'high'? A score above 750 is low risk. \
             If no policy is found, it is high risk. Respond with a JSON object with a \"riskDecision\" key. \
             For example: {{\"riskDecision\": \"low\"}}",
            score, policy
        )
    }

    async fn evaluate(
        &self,
        session: &SessionId,
        data: &mut DomainData,
        ctx: &StageContext,
    ) -> Result<StageReport, StageError> {
        let score = data
            .applicant
            .cibil_score
            .ok_or_else(|| StageError::validation("CIBIL score is required for credit analysis"))?;

        let policy = ctx.policies.for_score(score);
        let policy_json = serde_json::to_value(policy).map_err(|e| StageError::Internal(e.to_string()))?;

        let verdict = ctx.remote.reason_json(Self::prompt(score, &policy_json)).await?;
        let mut risk = verdict
            .get("riskDecision")
            .and_then(Value::as_str)
            .and_then(RiskLevel::parse)
            .ok_or_else(|| StageError::unparsable("credit reply has no valid riskDecision"))?;

        if policy.is_none() && risk != RiskLevel::High {
            warn!(session = %session, score, "no policy tier for score, forcing high risk");
            risk = RiskLevel::High;
        }

        let assessment = CreditAssessment {
            cibil_score: score,
            risk,
            policy_id: policy.map(|p| p.policy_id.clone()),
        };

        let cid = ctx
            .publish(
                channels::CREDIT,
                json!({
                    "stage": self.name(),
                    "action": "analyzeCredit",
                    "sessionId": session.as_str(),
                    "cibilScore": score,
                    "riskDecision": risk,
                    "policyId": assessment.policy_id,
                    "timestamp": now(),
                }),
            )
            .await?;

        info!(session = %session, score, risk = risk.as_str(), "credit analyzed");
        let acceptable = assessment.risk_acceptable();
        data.credit = Some(assessment);

        if !acceptable {
            return Ok(StageReport::reject("Credit risk not acceptable", Some(cid)));
        }
        Ok(StageReport::proceed(
            json!({ "riskDecision": risk, "riskAcceptable": true }),
            cid,
        ))
    }
}

#[async_trait::async_trait]
impl StageHandler for CreditAnalysisStage {
    fn name(&self) -> &str {
        "creditAnalysis"
    }

    fn channel(&self) -> &str {
        channels::CREDIT
    }

    async fn run(&self, session: &SessionId, data: &mut DomainData, ctx: &StageContext) -> StageReport {
        self.evaluate(session, data, ctx)
            .await
            .unwrap_or_else(StageReport::fatal)
    }
}
