//! Intent detection - classify the free-text request

use crate::context::{now, StageContext};
use crate::domain::DomainData;
use crate::registry::{StageError, StageHandler, StageReport};
use lendflow_core::SessionId;
use lendflow_ledger::channels;
use lendflow_remote::extract_json_object;
use serde_json::json;
use tracing::info;

pub const LOAN_APPLICATION: &str = "loanApplication";
const KNOWN_INTENTS: [&str; 4] = [LOAN_APPLICATION, "loanStatus", "generalInquiry", "unknown"];

pub struct IntentStage;

impl IntentStage {
    fn prompt(query: &str) -> String {
        format!(
            "Based on the user query, what is the intent? Query: {:?}. Respond with a single word \
             from this list: \"loanApplication\", \"loanStatus\", \"generalInquiry\", \"unknown\".",
            query
        )
    }

    async fn evaluate(
        &self,
        session: &SessionId,
        data: &mut DomainData,
        ctx: &StageContext,
    ) -> Result<StageReport, StageError> {
        if data.message.trim().is_empty() {
            return Err(StageError::validation("message is required"));
        }

        let reply = ctx.remote.reason(Self::prompt(&data.message)).await?;
        let intent = normalize_intent(&reply);

        let cid = ctx
            .publish(
                channels::INTERACTION,
                json!({
                    "stage": self.name(),
                    "action": "detectLoanIntent",
                    "sessionId": session.as_str(),
                    "query": data.message,
                    "intent": intent,
                    "timestamp": now(),
                }),
            )
            .await?;

        info!(session = %session, intent = %intent, "intent detected");
        data.intent = Some(intent.clone());

        if intent != LOAN_APPLICATION {
            return Ok(StageReport::reject("Invalid intent", Some(cid)));
        }
        Ok(StageReport::proceed(json!({ "intent": intent }), cid))
    }
}

/// Reduce a reply to a bare intent word.
///
/// Accepts a plain word (optionally quoted) or a JSON object with an
/// `intent` field. Anything else maps to "unknown".
pub fn normalize_intent(reply: &str) -> String {
    if let Ok(obj) = extract_json_object(reply) {
        if let Some(intent) = obj.get("intent").and_then(|v| v.as_str()) {
            return canonical_intent(intent);
        }
    }
    let word: String = reply
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '`' | '\r' | '\n' | '.'))
        .collect();
    canonical_intent(word.trim())
}

fn canonical_intent(word: &str) -> String {
    KNOWN_INTENTS
        .iter()
        .find(|k| k.eq_ignore_ascii_case(word))
        .map(|k| k.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[async_trait::async_trait]
impl StageHandler for IntentStage {
    fn name(&self) -> &str {
        "intent"
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_replies() {
        assert_eq!(normalize_intent("loanApplication"), "loanApplication");
        assert_eq!(normalize_intent("\"loanApplication\"\n"), "loanApplication");
        assert_eq!(normalize_intent("LoanApplication."), "loanApplication");
        assert_eq!(normalize_intent("```\nloanStatus\n```"), "loanStatus");
        assert_eq!(normalize_intent(r#"{"intent": "generalInquiry"}"#), "generalInquiry");
        assert_eq!(normalize_intent("I think they want a mortgage"), "unknown");
    }
}
