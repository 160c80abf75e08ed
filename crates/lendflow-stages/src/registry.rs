//! Stage trait, outcomes and the ordered pipeline
//!
//! Each stage is a self-contained module in stages/ implementing
//! [`StageHandler`]. The coordinator walks a [`StagePipeline`] in order.

use crate::context::StageContext;
use crate::domain::DomainData;
use lendflow_core::{ContentId, ErrorKind, SessionId};
use lendflow_ledger::LedgerError;
use lendflow_remote::RemoteError;
use serde_json::Value;
use std::sync::Arc;

/// Failures that end a workflow run.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Required input missing or malformed. Raised before any write.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An upstream decision this stage depends on is absent or negative.
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A reply parsed as JSON but lacks a usable decision.
    #[error("unparsable response: {0}")]
    Unparsable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StageError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn unparsable(msg: impl Into<String>) -> Self {
        Self::Unparsable(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Precondition(_) => ErrorKind::Precondition,
            Self::Remote(e) if e.is_rate_limit() => ErrorKind::RateLimited,
            Self::Remote(RemoteError::UnparsableResponse(_)) | Self::Unparsable(_) => {
                ErrorKind::UnparsableResponse
            }
            Self::Remote(_) => ErrorKind::Remote,
            Self::Ledger(e) if e.is_corruption() => ErrorKind::LedgerCorruption,
            Self::Ledger(_) => ErrorKind::Ledger,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[derive(Debug)]
pub enum StageOutcome {
    /// Decision data for this stage; the run moves on.
    Continue(Value),
    Reject(String),
    Fatal(StageError),
}

impl StageOutcome {
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }
}

/// What a stage hands back: its outcome plus the content id of the primary
/// artifact it recorded, if it got that far.
#[derive(Debug)]
pub struct StageReport {
    pub outcome: StageOutcome,
    pub primary: Option<ContentId>,
}

impl StageReport {
    pub fn proceed(decision: Value, primary: ContentId) -> Self {
        Self {
            outcome: StageOutcome::Continue(decision),
            primary: Some(primary),
        }
    }

    pub fn reject(reason: impl Into<String>, primary: Option<ContentId>) -> Self {
        Self {
            outcome: StageOutcome::Reject(reason.into()),
            primary,
        }
    }

    pub fn fatal(error: StageError) -> Self {
        Self::fatal_with(error, None)
    }

    /// Failure after the primary artifact was already recorded.
    pub fn fatal_with(error: StageError, primary: Option<ContentId>) -> Self {
        Self {
            outcome: StageOutcome::Fatal(error),
            primary,
        }
    }
}

/// One workflow step.
///
/// A stage uploads at most one primary artifact and appends its record to
/// `channel()`. Composite stages may write one extra sub-decision.
#[async_trait::async_trait]
pub trait StageHandler: Send + Sync {
    /// Step name used in the audit trail (e.g. "intent", "creditAnalysis").
    fn name(&self) -> &str;

    /// Ledger channel holding this stage's primary record.
    fn channel(&self) -> &str;

    async fn run(&self, session: &SessionId, data: &mut DomainData, ctx: &StageContext) -> StageReport;
}

/// Ordered list of stages.
#[derive(Clone, Default)]
pub struct StagePipeline {
    stages: Vec<Arc<dyn StageHandler>>,
}

impl StagePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stage: impl StageHandler + 'static) {
        self.stages.push(Arc::new(stage));
    }

    pub fn with(mut self, stage: impl StageHandler + 'static) -> Self {
        self.push(stage);
        self
    }

    pub fn get(&self, index: usize) -> Option<&Arc<dyn StageHandler>> {
        self.stages.get(index)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }
}
