//! Bearer-token authentication for the audit endpoints

use axum::http::{header, HeaderMap};
use lendflow_core::{AuthConfig, AuthMode, Error, Result};

pub const TOKEN_ENV: &str = "LENDFLOW_GATEWAY_TOKEN";

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() { return false; }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[derive(Clone, Debug)]
pub struct ResolvedAuth {
    pub mode: AuthMode,
    pub token: Option<String>,
}

impl ResolvedAuth {
    /// Configured token wins over the environment.
    pub fn from_config(config: &AuthConfig, env_token: Option<String>) -> Self {
        let token = config.token.clone().or(env_token).filter(|t| !t.is_empty());
        Self { mode: config.mode.clone(), token }
    }

    pub fn from_env(config: &AuthConfig) -> Self {
        Self::from_config(config, std::env::var(TOKEN_ENV).ok())
    }

    pub fn verify_token(&self, provided: Option<&str>) -> Result<()> {
        match self.mode {
            AuthMode::None => Ok(()),
            AuthMode::Token => {
                let expected = self.token.as_deref().ok_or_else(|| Error::auth_failed("no token configured"))?;
                let provided = provided.ok_or_else(|| Error::auth_failed("token required"))?;
                if !constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
                    return Err(Error::auth_failed("invalid token"));
                }
                Ok(())
            }
        }
    }

    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<()> {
        self.verify_token(bearer_token(headers))
    }
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_token_auth() {
        let auth = ResolvedAuth { mode: AuthMode::Token, token: Some("audit-token-123".into()) };
        assert!(auth.verify_token(Some("audit-token-123")).is_ok());
        assert!(auth.verify_token(Some("wrong-token")).is_err());
        assert!(auth.verify_token(None).is_err());
    }

    #[test]
    fn test_no_auth() {
        let auth = ResolvedAuth { mode: AuthMode::None, token: None };
        assert!(auth.verify_token(None).is_ok());
        assert!(auth.verify_token(Some("anything")).is_ok());
    }

    #[test]
    fn token_mode_without_token_denies_everything() {
        let auth = ResolvedAuth::from_config(&AuthConfig::default(), Some(String::new()));
        assert!(auth.token.is_none());
        assert!(auth.verify_token(Some("")).is_err());
    }

    #[test]
    fn config_token_beats_env() {
        let config = AuthConfig { mode: AuthMode::Token, token: Some("file".into()) };
        let auth = ResolvedAuth::from_config(&config, Some("env".into()));
        assert_eq!(auth.token.as_deref(), Some("file"));
    }

    #[test]
    fn bearer_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer s3cret"));
        assert_eq!(bearer_token(&headers), Some("s3cret"));
    }
}
