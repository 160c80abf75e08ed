//! Offer presentation and negotiation against a simulated borrower
//!
//! The borrower's reply is logged to the interaction channel (primary). An
//! accepted offer is additionally locked in the loan offer channel.

use crate::context::{now, StageContext};
use crate::domain::{DomainData, LoanOffer, NegotiatedOffer, OfferResponse};
use crate::registry::{StageError, StageHandler, StageReport};
use lendflow_core::SessionId;
use lendflow_ledger::channels;
use serde_json::{json, Value};
use tracing::info;

pub struct NegotiationStage;

impl NegotiationStage {
    fn prompt(offer: &LoanOffer, ceiling: f64) -> String {
        let offer_json = serde_json::to_string(offer).unwrap_or_default();
        format!(
            "A user is presented with a loan offer. The user can accept, reject, or negotiate. \
             Here is the offer: {}. The user's policy is to accept if the interest rate is below {}%, \
             otherwise they reject. What is the user's response? Respond with a JSON object that is the \
             original offer object, plus a \"userResponse\" key (\"accepted\" or \"rejected\") and a \
             \"reason\" key if rejected.",
            offer_json, ceiling
        )
    }

    async fn evaluate(
        &self,
        session: &SessionId,
        data: &mut DomainData,
        ctx: &StageContext,
    ) -> Result<StageReport, StageError> {
        let offer = data
            .offer
            .clone()
            .ok_or_else(|| StageError::precondition("no priced offer to negotiate"))?;

        let reply = ctx
            .remote
            .reason_json(Self::prompt(&offer, ctx.settings.acceptance_rate_ceiling))
            .await?;
        let response = match reply.get("userResponse").and_then(Value::as_str) {
            Some(r) if r.eq_ignore_ascii_case("accepted") => OfferResponse::Accepted,
            Some(_) => OfferResponse::Rejected,
            None => return Err(StageError::unparsable("negotiation reply has no userResponse")),
        };

        // Terms come from underwriting, never from the reply.
        let negotiated = NegotiatedOffer {
            offer,
            user_response: response,
            reason: reply
                .get("reason")
                .and_then(Value::as_str)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
        };

        let cid = ctx
            .publish(
                channels::INTERACTION,
                json!({
                    "stage": self.name(),
                    "action": "presentAndNegotiateOffer",
                    "sessionId": session.as_str(),
                    "offer": negotiated,
                    "timestamp": now(),
                }),
            )
            .await?;

        info!(session = %session, ?response, "offer negotiated");
        data.negotiated = Some(negotiated.clone());

        if !negotiated.is_accepted() {
            let reason = match &negotiated.reason {
                Some(r) => format!("User rejected the offer: {}", r),
                None => "User rejected the offer".to_string(),
            };
            return Ok(StageReport::reject(reason, Some(cid)));
        }

        let locked = ctx
            .publish(
                channels::LOAN_OFFER,
                json!({
                    "sessionId": session.as_str(),
                    "offer": negotiated,
                    "status": "locked",
                    "timestamp": now(),
                }),
            )
            .await;
        if let Err(e) = locked {
            return Ok(StageReport::fatal_with(e, Some(cid)));
        }

        Ok(StageReport::proceed(json!({ "finalOffer": negotiated }), cid))
    }
}

#[async_trait::async_trait]
impl StageHandler for NegotiationStage {
    fn name(&self) -> &str {
        "negotiation"
    }

    fn channel(&self) -> &str {
        channels::INTERACTION
    }

    async fn run(&self, session: &SessionId, data: &mut DomainData, ctx: &StageContext) -> StageReport {
        self.evaluate(session, data, ctx)
            .await
            .unwrap_or_else(StageReport::fatal)
    }
}
