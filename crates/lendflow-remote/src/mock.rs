//! In-process doubles for the remote collaborators

use crate::provider::{ArtifactStore, ReasoningService, RemoteError, RemoteResult};
use lendflow_core::ContentId;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

type Responder = Box<dyn Fn(&str) -> RemoteResult<String> + Send + Sync>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reasoning double that replays a script.
///
/// Queued replies are consumed first; once the queue is empty the responder
/// (if any) answers, otherwise the call fails with `RequestFailed`.
#[derive(Default)]
pub struct ScriptedReasoner {
    script: Mutex<VecDeque<RemoteResult<String>>>,
    responder: Option<Responder>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        lock(&self.script).push_back(Ok(text.into()));
        self
    }

    pub fn fail(self, err: RemoteError) -> Self {
        lock(&self.script).push_back(Err(err));
        self
    }

    /// Answer every unscripted prompt through `f`.
    pub fn respond_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> RemoteResult<String> + Send + Sync + 'static,
    {
        self.responder = Some(Box::new(f));
        self
    }

    pub fn always_fail(self, err: RemoteError) -> Self {
        self.respond_with(move |_| Err(err.clone()))
    }

    pub fn push_reply(&self, text: impl Into<String>) {
        lock(&self.script).push_back(Ok(text.into()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

#[async_trait::async_trait]
impl ReasoningService for ScriptedReasoner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> RemoteResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.prompts).push(prompt.to_string());
        if let Some(next) = lock(&self.script).pop_front() {
            return next;
        }
        match &self.responder {
            Some(f) => f(prompt),
            None => Err(RemoteError::RequestFailed("script exhausted".into())),
        }
    }
}

/// Artifact store double. Content ids are `mem-<sha256 of the JSON>`.
#[derive(Default)]
pub struct MemoryArtifactStore {
    documents: Mutex<HashMap<String, Value>>,
    failures: Mutex<VecDeque<RemoteError>>,
    uploads: AtomicUsize,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next upload attempt fail with `err`.
    pub fn fail_next(&self, err: RemoteError) {
        lock(&self.failures).push_back(err);
    }

    /// Successful uploads so far.
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn documents(&self) -> Vec<Value> {
        lock(&self.documents).values().cloned().collect()
    }

    pub fn content_id_for(document: &Value) -> ContentId {
        // serde_json maps are ordered, so this encoding is stable
        let bytes = serde_json::to_vec(document).unwrap_or_default();
        let hash = Sha256::digest(&bytes);
        let hex: String = hash.iter().map(|b| format!("{:02x}", b)).collect();
        ContentId::new(format!("mem-{}", hex))
    }
}

#[async_trait::async_trait]
impl ArtifactStore for MemoryArtifactStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put_json(&self, document: &Value) -> RemoteResult<ContentId> {
        if let Some(err) = lock(&self.failures).pop_front() {
            return Err(err);
        }
        let cid = Self::content_id_for(document);
        lock(&self.documents).insert(cid.as_str().to_string(), document.clone());
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(cid)
    }

    async fn get_json(&self, cid: &ContentId) -> RemoteResult<Value> {
        lock(&self.documents)
            .get(cid.as_str())
            .cloned()
            .ok_or_else(|| RemoteError::RequestFailed(format!("unknown content id {}", cid)))
    }
}
