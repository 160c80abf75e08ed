//! Gemini `generateContent` adapter

use crate::provider::{classify_status, ReasoningService, RemoteError, RemoteResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

pub struct GeminiReasoner {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiReasoner {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: Some(api_key.into()),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Key from `GEMINI_API_KEY`. A missing key is reported on first use.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()),
            ..Self::new("")
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait::async_trait]
impl ReasoningService for GeminiReasoner {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> RemoteResult<String> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| RemoteError::MissingCredentials(API_KEY_ENV.into()))?;

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt.to_string() }],
            }],
        };

        debug!(model = %self.model, prompt_chars = prompt.len(), "gemini request");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            error!("Gemini error {}: {}", status, text);
            return Err(classify_status(status, &headers, &text));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::MalformedResponse(e.to_string()))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| RemoteError::MalformedResponse("no candidate text in reply".into()))
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}
