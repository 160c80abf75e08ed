//! lendflow.toml - gateway, ledger, remote and workflow settings
//!
//! Every section is optional. Secrets never live in the file; they are read
//! from the environment when the collaborators are built.

use lendflow_core::{Error, GatewayConfig, Result};
use lendflow_remote::{gemini, pinata, RetryPolicy};
use lendflow_stages::context::SIGNING_KEY_ENV;
use lendflow_stages::policy::default_tiers;
use lendflow_stages::{PolicyTable, PolicyTier, WorkflowSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "lendflow.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LendflowConfig {
    pub gateway: GatewayConfig,
    pub ledger: LedgerSection,
    pub retry: RetrySection,
    pub reasoning: ReasoningSection,
    pub artifacts: ArtifactsSection,
    pub workflow: WorkflowSection,
    pub policies: Vec<PolicyTier>,
}

impl Default for LendflowConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            ledger: LedgerSection::default(),
            retry: RetrySection::default(),
            reasoning: ReasoningSection::default(),
            artifacts: ArtifactsSection::default(),
            workflow: WorkflowSection::default(),
            policies: default_tiers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    pub dir: PathBuf,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self { dir: PathBuf::from("ledger") }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 16_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningSection {
    pub model: String,
    pub base_url: String,
}

impl Default for ReasoningSection {
    fn default() -> Self {
        Self {
            model: gemini::DEFAULT_MODEL.into(),
            base_url: gemini::DEFAULT_BASE_URL.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsSection {
    pub api_url: String,
    pub gateway_url: String,
    pub timeout_secs: u64,
}

impl Default for ArtifactsSection {
    fn default() -> Self {
        Self {
            api_url: pinata::DEFAULT_API_URL.into(),
            gateway_url: pinata::DEFAULT_GATEWAY_URL.into(),
            timeout_secs: pinata::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSection {
    /// Name of the environment variable holding the sanction signing key.
    pub signing_key_env: String,
    pub acceptance_rate_ceiling: f64,
    pub lender_name: String,
}

impl Default for WorkflowSection {
    fn default() -> Self {
        let settings = WorkflowSettings::default();
        Self {
            signing_key_env: SIGNING_KEY_ENV.into(),
            acceptance_rate_ceiling: settings.acceptance_rate_ceiling,
            lender_name: settings.lender_name,
        }
    }
}

impl LendflowConfig {
    /// Parse TOML text. Malformed policy tiers are a config error.
    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::config(e.to_string()))?;
        for tier in &config.policies {
            tier.validate().map_err(Error::config)?;
        }
        Ok(config)
    }

    /// Load from `path`. A missing or unparsable file yields the defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => {
                    info!(path = %path.display(), "configuration loaded");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unparsable configuration, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "no configuration file, using defaults");
                Self::default()
            }
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_millis(
            self.retry.max_attempts.max(1),
            self.retry.base_delay_ms,
            self.retry.max_delay_ms,
        )
    }

    /// Configured tiers, or the built-in ones when the list is empty.
    pub fn policy_table(&self) -> PolicyTable {
        if self.policies.is_empty() {
            PolicyTable::default()
        } else {
            PolicyTable::new(self.policies.clone())
        }
    }

    pub fn artifact_timeout(&self) -> Duration {
        Duration::from_secs(self.artifacts.timeout_secs.max(1))
    }

    /// Workflow settings with the signing key read from the configured variable.
    pub fn workflow_settings(&self) -> WorkflowSettings {
        let mut settings = WorkflowSettings {
            acceptance_rate_ceiling: self.workflow.acceptance_rate_ceiling,
            lender_name: self.workflow.lender_name.clone(),
            ..WorkflowSettings::default()
        };
        match std::env::var(&self.workflow.signing_key_env) {
            Ok(key) if !key.is_empty() => settings.signing_key = key,
            _ => warn!(
                var = %self.workflow.signing_key_env,
                "signing key not set, sanction letters use the development key"
            ),
        }
        settings
    }
}
