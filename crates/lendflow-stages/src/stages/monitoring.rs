//! Repayment monitoring
//!
//! The pipeline bootstraps monitoring with a zero-amount payment right after
//! disbursement. Later payments go through [`log_emi_payment`] directly.

use crate::context::{now, StageContext};
use crate::domain::{DomainData, PaymentReceipt, RiskLevel, RiskPrediction};
use crate::registry::{StageError, StageHandler, StageReport};
use lendflow_core::{PaymentData, SessionId};
use lendflow_ledger::{channels, content_hash};
use serde_json::{json, Value};
use tracing::info;

pub struct MonitoringStage;

fn prompt(history: &[Value]) -> String {
    let history_json = serde_json::to_string(history).unwrap_or_default();
    format!(
        "Given the following payment history for a loan, predict the default risk ('low', 'medium', 'high'). \
         History: {}. If there are fewer than 3 payments, risk is 'low' and message is 'Monitoring started.'. \
         If payments are consistent, risk is 'low' and message is 'Payments are consistent.'. \
         Respond with a JSON object containing \"risk\" and \"message\" keys.",
        history_json
    )
}

/// Trend prediction over every payment recorded for `loan_id`.
pub async fn predict_default_risk(ctx: &StageContext, loan_id: &str) -> Result<RiskPrediction, StageError> {
    let history: Vec<Value> = ctx
        .ledger
        .read(channels::PAYMENT)
        .await?
        .into_iter()
        .map(|r| r.payload)
        .filter(|p| p.get("loanId").and_then(Value::as_str) == Some(loan_id))
        .collect();

    let reply = ctx.remote.reason_json(prompt(&history)).await?;
    let risk = reply
        .get("risk")
        .and_then(Value::as_str)
        .and_then(RiskLevel::parse)
        .ok_or_else(|| StageError::unparsable("prediction reply has no valid risk"))?;
    let message = reply
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(RiskPrediction { risk, message })
}

/// Record one EMI payment with a fresh default-risk prediction.
pub async fn log_emi_payment(
    ctx: &StageContext,
    loan_id: &str,
    payment: &PaymentData,
) -> Result<PaymentReceipt, StageError> {
    if loan_id.trim().is_empty() {
        return Err(StageError::validation("loanId is required"));
    }
    if !payment.amount.is_finite() || payment.amount < 0.0 {
        return Err(StageError::validation("payment amount must be a non-negative number"));
    }
    let payment_date = payment.payment_date.clone().unwrap_or_else(now);
    let payment_id = content_hash(&json!({
        "loanId": loan_id,
        "amount": payment.amount,
        "paymentDate": payment_date,
    }));

    let prediction = predict_default_risk(ctx, loan_id).await?;

    let cid = ctx
        .publish(
            channels::PAYMENT,
            json!({
                "stage": "monitoring",
                "action": "logEmiPayment",
                "loanId": loan_id,
                "paymentId": payment_id,
                "amount": payment.amount,
                "paymentDate": payment_date,
                "riskPrediction": prediction,
                "timestamp": now(),
            }),
        )
        .await?;

    info!(loan_id, risk = prediction.risk.as_str(), "emi payment logged");
    Ok(PaymentReceipt {
        payment_status: "logged".into(),
        payment_id,
        payment_cid: cid,
        risk_prediction: prediction,
    })
}

impl MonitoringStage {
    async fn evaluate(
        &self,
        _session: &SessionId,
        data: &mut DomainData,
        ctx: &StageContext,
    ) -> Result<StageReport, StageError> {
        let loan_id = data
            .loan_id()
            .ok_or_else(|| StageError::precondition("no loan to monitor"))?
            .to_string();

        let bootstrap = PaymentData {
            amount: 0.0,
            payment_date: Some(now()),
        };
        let receipt = log_emi_payment(ctx, &loan_id, &bootstrap).await?;
        let cid = receipt.payment_cid.clone();
        let decision = json!(receipt);
        data.monitoring = Some(receipt);
        Ok(StageReport::proceed(decision, cid))
    }
}

#[async_trait::async_trait]
impl StageHandler for MonitoringStage {
    fn name(&self) -> &str {
        "monitoring"
    }

    fn channel(&self) -> &str {
        channels::PAYMENT
    }

    async fn run(&self, session: &SessionId, data: &mut DomainData, ctx: &StageContext) -> StageReport {
        self.evaluate(session, data, ctx)
            .await
            .unwrap_or_else(StageReport::fatal)
    }
}
