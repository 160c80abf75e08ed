//! Disbursement with EMI schedule

use crate::amortization;
use crate::context::{now, StageContext};
use crate::domain::{DisbursementReceipt, DomainData};
use crate::registry::{StageError, StageHandler, StageReport};
use lendflow_core::SessionId;
use lendflow_ledger::channels;
use serde_json::json;
use tracing::info;

pub struct DisbursementStage;

impl DisbursementStage {
    async fn evaluate(
        &self,
        session: &SessionId,
        data: &mut DomainData,
        ctx: &StageContext,
    ) -> Result<StageReport, StageError> {
        let letter = data
            .sanction
            .as_ref()
            .ok_or_else(|| StageError::precondition("no sanction letter to disburse against"))?;

        let schedule = amortization::schedule(letter.loan_amount, letter.interest_rate, letter.term_months);
        let transaction_id = uuid::Uuid::new_v4().to_string();

        let cid = ctx
            .publish(
                channels::DISBURSEMENT,
                json!({
                    "stage": self.name(),
                    "action": "disburseFunds",
                    "sessionId": session.as_str(),
                    "loanId": letter.loan_id,
                    "transactionId": transaction_id,
                    "amount": letter.loan_amount,
                    "monthlyEmi": schedule.monthly_emi,
                    "emiSchedule": schedule.installments,
                    "timestamp": now(),
                }),
            )
            .await?;

        info!(session = %session, loan_id = %letter.loan_id, emi = schedule.monthly_emi, "funds disbursed");
        let receipt = DisbursementReceipt {
            disbursement_status: "completed".into(),
            transaction_id,
            monthly_emi: schedule.monthly_emi,
            disbursement_cid: cid.clone(),
        };
        data.disbursement = Some(receipt.clone());
        Ok(StageReport::proceed(json!(receipt), cid))
    }
}

#[async_trait::async_trait]
impl StageHandler for DisbursementStage {
    fn name(&self) -> &str {
        "disbursement"
    }

    fn channel(&self) -> &str {
        channels::DISBURSEMENT
    }

    async fn run(&self, session: &SessionId, data: &mut DomainData, ctx: &StageContext) -> StageReport {
        self.evaluate(session, data, ctx)
            .await
            .unwrap_or_else(StageReport::fatal)
    }
}
