//! Pinata IPFS pinning adapter

use crate::provider::{classify_status, ArtifactStore, RemoteError, RemoteResult};
use lendflow_core::ContentId;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

pub const DEFAULT_API_URL: &str = "https://api.pinata.cloud";
pub const DEFAULT_GATEWAY_URL: &str = "https://gateway.pinata.cloud";
pub const JWT_ENV: &str = "PINATA_JWT";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PinataStore {
    client: Client,
    jwt: Option<String>,
    api_url: String,
    gateway_url: String,
    timeout: Duration,
}

impl PinataStore {
    pub fn new(jwt: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            jwt: Some(jwt.into()),
            api_url: DEFAULT_API_URL.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// JWT from `PINATA_JWT`. A missing token is reported on first upload.
    pub fn from_env() -> Self {
        Self {
            jwt: std::env::var(JWT_ENV).ok().filter(|t| !t.is_empty()),
            ..Self::new("")
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: Option<String>,
}

#[async_trait::async_trait]
impl ArtifactStore for PinataStore {
    fn name(&self) -> &str {
        "pinata"
    }

    async fn put_json(&self, document: &Value) -> RemoteResult<ContentId> {
        let jwt = self
            .jwt
            .as_deref()
            .ok_or_else(|| RemoteError::MissingCredentials(JWT_ENV.into()))?;

        let url = format!("{}/pinning/pinJSONToIPFS", self.api_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(jwt)
            .timeout(self.timeout)
            .json(document)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            error!("Pinata error {}: {}", status, text);
            return Err(classify_status(status, &headers, &text));
        }

        let pinned: PinResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::MalformedResponse(e.to_string()))?;
        let cid = pinned
            .ipfs_hash
            .filter(|h| !h.is_empty())
            .ok_or_else(|| RemoteError::MalformedResponse("missing IpfsHash".into()))?;

        debug!(cid = %cid, "pinned json");
        Ok(ContentId::new(cid))
    }

    async fn get_json(&self, cid: &ContentId) -> RemoteResult<Value> {
        let url = format!("{}/ipfs/{}", self.gateway_url.trim_end_matches('/'), cid);
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &headers, &text));
        }
        response
            .json()
            .await
            .map_err(|e| RemoteError::MalformedResponse(e.to_string()))
    }
}
