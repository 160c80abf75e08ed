//! Injected collaborators shared by every stage

use crate::policy::PolicyTable;
use crate::registry::StageError;
use lendflow_core::ContentId;
use lendflow_ledger::Ledger;
use lendflow_remote::ResilientClient;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub const SIGNING_KEY_ENV: &str = "LENDFLOW_SIGNING_KEY";

/// Tunables that are not policy tiers.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// HMAC key for sanction letters.
    pub signing_key: String,
    /// Rate (percent) below which the simulated borrower accepts an offer.
    pub acceptance_rate_ceiling: f64,
    pub lender_name: String,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            signing_key: "lendflow-dev-signing-key".into(),
            acceptance_rate_ceiling: 10.0,
            lender_name: "Lendflow".into(),
        }
    }
}

impl WorkflowSettings {
    /// Defaults, with the signing key taken from `LENDFLOW_SIGNING_KEY` when set.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(key) = std::env::var(SIGNING_KEY_ENV) {
            if !key.is_empty() {
                settings.signing_key = key;
            }
        }
        settings
    }
}

#[derive(Clone)]
pub struct StageContext {
    pub ledger: Arc<dyn Ledger>,
    pub remote: Arc<ResilientClient>,
    pub policies: Arc<PolicyTable>,
    pub settings: WorkflowSettings,
}

impl StageContext {
    pub fn new(ledger: Arc<dyn Ledger>, remote: Arc<ResilientClient>) -> Self {
        Self {
            ledger,
            remote,
            policies: Arc::new(PolicyTable::default()),
            settings: WorkflowSettings::default(),
        }
    }

    pub fn with_policies(mut self, policies: PolicyTable) -> Self {
        self.policies = Arc::new(policies);
        self
    }

    pub fn with_settings(mut self, settings: WorkflowSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Upload `document`, then append it with its content id to `channel`.
    ///
    /// The content id is returned only once the append is durable.
    pub async fn publish(&self, channel: &str, document: Value) -> Result<ContentId, StageError> {
        let cid = self.remote.store(document.clone()).await?;

        let payload = match document {
            Value::Object(mut map) => {
                map.insert("cid".into(), Value::String(cid.to_string()));
                Value::Object(map)
            }
            other => json!({ "document": other, "cid": cid.as_str() }),
        };
        let record = self.ledger.append(channel, payload).await?;

        info!(channel, cid = %cid, hash = %record.hash, "stage record appended");
        Ok(cid)
    }
}

/// RFC 3339 timestamp for payloads.
pub fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
