//! Retry policy and the resilient client that applies it
//!
//! # Policy
//!
//! - Max attempts: 5 (initial call included)
//! - Backoff: 1s doubling, capped at 16s
//! - A server-suggested wait (`Retry-After`, or "retry in Ns" in a 429 body)
//!   replaces the computed delay for that attempt
//!
//! Only `RateLimited` and `Overloaded` are retried. Exhaustion after rate
//! limiting surfaces as `QuotaExhausted`, anything else as `RetriesExhausted`.

use crate::extract::extract_json_object;
use crate::provider::{ArtifactStore, ReasoningService, RemoteError, RemoteResult};
use crate::types::{RemoteRequest, RemoteResponse};
use lendflow_core::ContentId;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, not counting retries separately.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(16000),
        }
    }
}

impl RetryPolicy {
    pub fn from_millis(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    /// Delay before retry number `step + 1`: `base * 2^step`, capped.
    pub fn backoff(&self, step: u32) -> Duration {
        let factor = 2u32.saturating_pow(step);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Wraps the reasoning service and artifact store with a shared retry policy.
pub struct ResilientClient {
    reasoner: Arc<dyn ReasoningService>,
    store: Arc<dyn ArtifactStore>,
    policy: RetryPolicy,
}

impl ResilientClient {
    pub fn new(reasoner: Arc<dyn ReasoningService>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            reasoner,
            store,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn call(&self, request: RemoteRequest) -> RemoteResult<RemoteResponse> {
        match request {
            RemoteRequest::Reason { prompt } => {
                let text = self
                    .with_retry(self.reasoner.name(), || self.reasoner.generate(&prompt))
                    .await?;
                debug!(chars = text.len(), "reasoning reply");
                Ok(RemoteResponse::Text(text))
            }
            RemoteRequest::Store { document } => {
                let cid = self
                    .with_retry(self.store.name(), || self.store.put_json(&document))
                    .await?;
                debug!(cid = %cid, "artifact stored");
                Ok(RemoteResponse::ContentId(cid))
            }
        }
    }

    pub async fn reason(&self, prompt: impl Into<String>) -> RemoteResult<String> {
        let response = self.call(RemoteRequest::Reason { prompt: prompt.into() }).await?;
        response
            .into_text()
            .ok_or_else(|| RemoteError::MalformedResponse("expected text reply".into()))
    }

    /// Reason, then recover a JSON object from the reply.
    pub async fn reason_json(&self, prompt: impl Into<String>) -> RemoteResult<Value> {
        let text = self.reason(prompt).await?;
        Ok(extract_json_object(&text)?)
    }

    pub async fn store(&self, document: Value) -> RemoteResult<ContentId> {
        let response = self.call(RemoteRequest::Store { document }).await?;
        response
            .into_content_id()
            .ok_or_else(|| RemoteError::MalformedResponse("expected content id".into()))
    }

    /// Read an artifact back. Reads are not retried.
    pub async fn fetch(&self, cid: &ContentId) -> RemoteResult<Value> {
        self.store.get_json(cid).await
    }

    async fn with_retry<T, F, Fut>(&self, target: &str, mut op: F) -> RemoteResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        let max = self.policy.attempts();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() => e,
                Err(e) => return Err(e),
            };

            if attempt >= max {
                warn!(target_service = target, attempts = attempt, "retry budget exhausted: {}", err);
                return Err(match err {
                    RemoteError::RateLimited { .. } => RemoteError::QuotaExhausted { attempts: attempt },
                    other => RemoteError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(other),
                    },
                });
            }

            let wait = err
                .retry_after()
                .unwrap_or_else(|| self.policy.backoff(attempt - 1));
            warn!(
                target_service = target,
                attempt,
                wait_ms = wait.as_millis() as u64,
                "transient failure, retrying: {}",
                err
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MemoryArtifactStore, ScriptedReasoner};
    use serde_json::json;

    fn fast() -> RetryPolicy {
        RetryPolicy::from_millis(5, 1, 4)
    }

    fn client(reasoner: Arc<ScriptedReasoner>) -> ResilientClient {
        ResilientClient::new(reasoner, Arc::new(MemoryArtifactStore::new())).with_policy(fast())
    }

    #[test]
    fn default_policy() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 5);
        assert_eq!(p.backoff(0), Duration::from_secs(1));
        assert_eq!(p.backoff(1), Duration::from_secs(2));
        assert_eq!(p.backoff(3), Duration::from_secs(8));
        assert_eq!(p.backoff(4), Duration::from_secs(16));
        assert_eq!(p.backoff(10), Duration::from_secs(16));
        assert_eq!(p.backoff(40), Duration::from_secs(16));
    }

    #[tokio::test]
    async fn always_overloaded_uses_exact_budget() {
        let reasoner = Arc::new(
            ScriptedReasoner::new().always_fail(RemoteError::Overloaded { retry_after: None }),
        );
        let err = client(reasoner.clone()).reason("hi").await.unwrap_err();
        assert_eq!(reasoner.calls(), 5);
        match err {
            RemoteError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 5);
                assert!(matches!(*last, RemoteError::Overloaded { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_exhaustion_is_quota() {
        let reasoner = Arc::new(
            ScriptedReasoner::new().always_fail(RemoteError::RateLimited {
                retry_after: Some(Duration::from_millis(1)),
            }),
        );
        let err = client(reasoner.clone()).reason("hi").await.unwrap_err();
        assert!(matches!(err, RemoteError::QuotaExhausted { attempts: 5 }));
        assert_eq!(reasoner.calls(), 5);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let reasoner = Arc::new(
            ScriptedReasoner::new()
                .fail(RemoteError::Overloaded { retry_after: None })
                .fail(RemoteError::RateLimited { retry_after: None })
                .reply("ok"),
        );
        assert_eq!(client(reasoner.clone()).reason("hi").await.unwrap(), "ok");
        assert_eq!(reasoner.calls(), 3);
    }

    #[tokio::test]
    async fn non_transient_fails_immediately() {
        let reasoner = Arc::new(ScriptedReasoner::new().fail(RemoteError::AuthFailed("bad key".into())));
        let err = client(reasoner.clone()).reason("hi").await.unwrap_err();
        assert!(matches!(err, RemoteError::AuthFailed(_)));
        assert_eq!(reasoner.calls(), 1);
    }

    #[tokio::test]
    async fn reason_json_extracts_fenced_reply() {
        let reasoner = Arc::new(ScriptedReasoner::new().reply("```json\n{\"intent\": \"loanApplication\"}\n```"));
        let v = client(reasoner).reason_json("classify").await.unwrap();
        assert_eq!(v, json!({"intent": "loanApplication"}));
    }

    #[tokio::test]
    async fn reason_json_unparsable_is_distinct() {
        let reasoner = Arc::new(ScriptedReasoner::new().reply("no idea"));
        let err = client(reasoner).reason_json("classify").await.unwrap_err();
        assert!(matches!(err, RemoteError::UnparsableResponse(_)));
    }

    #[tokio::test]
    async fn store_retries_transient_uploads() {
        let store = Arc::new(MemoryArtifactStore::new());
        store.fail_next(RemoteError::Overloaded { retry_after: None });
        let client = ResilientClient::new(Arc::new(ScriptedReasoner::new()), store.clone())
            .with_policy(fast());
        let cid = client.store(json!({"a": 1})).await.unwrap();
        assert!(cid.as_str().starts_with("mem-"));
        assert_eq!(store.uploads(), 1);
        assert_eq!(client.fetch(&cid).await.unwrap(), json!({"a": 1}));
    }
}
