//! Underwriting - policy match and pricing

use crate::context::{now, StageContext};
use crate::domain::{DomainData, LoanOffer, RiskLevel};
use crate::policy::PolicyTier;
use crate::registry::{StageError, StageHandler, StageReport};
use lendflow_core::SessionId;
use lendflow_ledger::channels;
use serde_json::{json, Value};
use tracing::{info, warn};

pub const HIGH_RISK: &str = "High risk profile";
pub const NO_POLICY: &str = "Loan amount or credit score does not meet policy requirements.";

pub struct UnderwritingStage;

impl UnderwritingStage {
    fn prompt(score: u32, risk: RiskLevel, amount: f64, tier: &PolicyTier) -> String {
        let tier_json = serde_json::to_string(tier).unwrap_or_default();
        format!(
            "An applicant with CIBIL score {} and risk decision '{}' is applying for a loan of {}. \
             The applicable policy is {}. Based on this, determine the interest rate. For 'low' risk, \
             use the minimum rate from interestRateRange. For 'medium' risk, use the average of min and \
             max from interestRateRange. Respond with a JSON object with an \"interestRate\" key. \
             For example: {{\"interestRate\": 8.5}}",
            score,
            risk.as_str(),
            amount,
            tier_json
        )
    }

    async fn ineligible(
        &self,
        session: &SessionId,
        ctx: &StageContext,
        reason: &str,
    ) -> Result<StageReport, StageError> {
        let cid = ctx
            .publish(
                channels::UNDERWRITING,
                json!({
                    "stage": self.name(),
                    "action": "evaluateRiskAndPrice",
                    "sessionId": session.as_str(),
                    "decision": "ineligible",
                    "reason": reason,
                    "timestamp": now(),
                }),
            )
            .await?;
        info!(session = %session, reason, "underwriting ineligible");
        Ok(StageReport::reject(reason, Some(cid)))
    }

    async fn evaluate(
        &self,
        session: &SessionId,
        data: &mut DomainData,
        ctx: &StageContext,
    ) -> Result<StageReport, StageError> {
        let credit = data
            .credit
            .clone()
            .ok_or_else(|| StageError::precondition("credit assessment missing"))?;
        let amount = match data.applicant.loan_amount {
            Some(a) if a.is_finite() && a > 0.0 => a,
            Some(_) => return Err(StageError::validation("loan amount must be positive")),
            None => return Err(StageError::validation("loan amount is required")),
        };

        if credit.risk == RiskLevel::High {
            return self.ineligible(session, ctx, HIGH_RISK).await;
        }
        let Some(tier) = ctx.policies.for_application(credit.cibil_score, amount).cloned() else {
            return self.ineligible(session, ctx, NO_POLICY).await;
        };

        let verdict = ctx
            .remote
            .reason_json(Self::prompt(credit.cibil_score, credit.risk, amount, &tier))
            .await?;
        let quoted = parse_rate(verdict.get("interestRate"))
            .ok_or_else(|| StageError::unparsable("pricing reply missing a valid interestRate"))?;

        let rate = tier.clamp_rate(quoted);
        if (rate - quoted).abs() > 0.005 {
            warn!(session = %session, quoted, rate, policy = %tier.policy_id, "quoted rate clamped into policy range");
        }

        let offer = LoanOffer {
            loan_amount: amount,
            interest_rate: rate,
            term_months: tier.term_months,
            policy_id: tier.policy_id.clone(),
        };

        let cid = ctx
            .publish(
                channels::UNDERWRITING,
                json!({
                    "stage": self.name(),
                    "action": "evaluateRiskAndPrice",
                    "sessionId": session.as_str(),
                    "decision": "eligible",
                    "offer": offer,
                    "timestamp": now(),
                }),
            )
            .await?;

        info!(session = %session, rate, policy = %tier.policy_id, "offer priced");
        data.offer = Some(offer.clone());
        Ok(StageReport::proceed(json!({ "eligibility": true, "offer": offer }), cid))
    }
}

/// Numbers, numeric strings and "9.5%" are all accepted.
pub fn parse_rate(v: Option<&Value>) -> Option<f64> {
    let rate = match v? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok()?,
        _ => return None,
    };
    (rate.is_finite() && rate >= 0.0).then_some(rate)
}

#[async_trait::async_trait]
impl StageHandler for UnderwritingStage {
    fn name(&self) -> &str {
        "underwriting"
    }

    fn channel(&self) -> &str {
        channels::UNDERWRITING
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
    fn rate_parsing() {
        assert_eq!(parse_rate(Some(&json!(8.5))), Some(8.5));
        assert_eq!(parse_rate(Some(&json!("9.25"))), Some(9.25));
        assert_eq!(parse_rate(Some(&json!(" 11% "))), Some(11.0));
        assert_eq!(parse_rate(Some(&json!("cheap"))), None);
        assert_eq!(parse_rate(Some(&json!(-1))), None);
        assert_eq!(parse_rate(None), None);
    }
}
