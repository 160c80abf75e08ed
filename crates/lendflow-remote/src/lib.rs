//! Lendflow Remote - reasoning and artifact-store adapters behind a retrying client

pub mod extract;
pub mod gemini;
pub mod mock;
pub mod pinata;
pub mod provider;
pub mod retry;
pub mod types;

pub use extract::{extract_json_object, UnparsableResponse};
pub use gemini::GeminiReasoner;
pub use pinata::PinataStore;
pub use provider::{ArtifactStore, ReasoningService, RemoteError, RemoteResult};
pub use retry::{ResilientClient, RetryPolicy};
pub use types::*;
