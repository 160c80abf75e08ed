//! Request/response envelopes for the resilient client

use lendflow_core::ContentId;
use serde_json::Value;

/// One logical remote operation.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteRequest {
    /// Free-text prompt to the reasoning service.
    Reason { prompt: String },
    /// JSON document to pin in the artifact store.
    Store { document: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteResponse {
    Text(String),
    ContentId(ContentId),
}

impl RemoteResponse {
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(t) => Some(t),
            Self::ContentId(_) => None,
        }
    }

    pub fn into_content_id(self) -> Option<ContentId> {
        match self {
            Self::ContentId(c) => Some(c),
            Self::Text(_) => None,
        }
    }
}
