//! Remote collaborator traits and error classification

use crate::extract::UnparsableResponse;
use lendflow_core::ContentId;
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;

/// Result type for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Remote error types.
///
/// `RateLimited` and `Overloaded` are transient and retried by
/// [`ResilientClient`](crate::ResilientClient); everything else fails fast.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("service overloaded (retry after {retry_after:?})")]
    Overloaded { retry_after: Option<Duration> },

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("missing credentials: {0} is not set")]
    MissingCredentials(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("quota exceeded after {attempts} attempts; retry later or reduce request rate")]
    QuotaExhausted { attempts: u32 },

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<RemoteError> },

    #[error(transparent)]
    UnparsableResponse(#[from] UnparsableResponse),
}

impl RemoteError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Overloaded { .. })
    }

    /// Server-suggested wait, if the failure carried one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } | Self::Overloaded { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// True for rate limits, including a retry budget spent on them.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::QuotaExhausted { .. })
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Reasoning service: one prompt in, one free-text reply out. Single attempt.
#[async_trait::async_trait]
pub trait ReasoningService: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> RemoteResult<String>;
}

/// Content-addressed artifact store. Single attempt.
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    fn name(&self) -> &str;

    async fn put_json(&self, document: &Value) -> RemoteResult<ContentId>;

    async fn get_json(&self, cid: &ContentId) -> RemoteResult<Value>;
}

/// Map a non-success HTTP response onto the error taxonomy.
pub(crate) fn classify_status(status: StatusCode, headers: &HeaderMap, body: &str) -> RemoteError {
    match status.as_u16() {
        401 | 403 => RemoteError::AuthFailed(format!("{}: {}", status, truncate(body))),
        429 => RemoteError::RateLimited {
            retry_after: parse_retry_after(headers).or_else(|| retry_hint_from_body(body)),
        },
        502..=504 => RemoteError::Overloaded {
            retry_after: parse_retry_after(headers),
        },
        _ => RemoteError::RequestFailed(format!("{}: {}", status, truncate(body))),
    }
}

/// `Retry-After` in (possibly fractional) seconds. HTTP-date values are ignored.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get("retry-after")?.to_str().ok()?;
    let secs: f64 = raw.trim().parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

/// Quota errors phrase the wait as "Please retry in 12.5s".
pub fn retry_hint_from_body(body: &str) -> Option<Duration> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = RE
        .get_or_init(|| Regex::new(r"(?i)retry in\s+([0-9]+(?:\.[0-9]+)?)\s*s").ok())
        .as_ref()?;
    let secs: f64 = re.captures(body)?.get(1)?.as_str().parse().ok()?;
    Some(Duration::from_secs_f64(secs))
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(300) {
        Some((i, _)) => &body[..i],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn classify_statuses() {
        let h = HeaderMap::new();
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, &h, ""),
            RemoteError::AuthFailed(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, &h, ""),
            RemoteError::Overloaded { retry_after: None }
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, &h, "bad"),
            RemoteError::RequestFailed(_)
        ));
    }

    #[test]
    fn header_wins_over_body_hint() {
        let mut h = HeaderMap::new();
        h.insert("retry-after", HeaderValue::from_static("2"));
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, &h, "Please retry in 9s");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn body_hint_is_parsed() {
        assert_eq!(
            retry_hint_from_body("Quota exceeded. Please retry in 12.5s."),
            Some(Duration::from_millis(12500))
        );
        assert_eq!(retry_hint_from_body("RETRY IN 3 s"), Some(Duration::from_secs(3)));
        assert_eq!(retry_hint_from_body("try again later"), None);
    }

    #[test]
    fn retry_after_ignores_dates() {
        let mut h = HeaderMap::new();
        h.insert(
            "retry-after",
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&h), None);
    }

    #[test]
    fn transient_classes() {
        assert!(RemoteError::RateLimited { retry_after: None }.is_transient());
        assert!(RemoteError::Overloaded { retry_after: None }.is_transient());
        assert!(!RemoteError::Timeout.is_transient());
        assert!(!RemoteError::AuthFailed("x".into()).is_transient());
        assert!(RemoteError::QuotaExhausted { attempts: 5 }.is_rate_limit());
    }
}
