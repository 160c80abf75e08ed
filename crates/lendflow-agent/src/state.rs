//! Workflow state machine
//!
//! ```text
//! Running(i) --Continue--> Running(i+1) | Approved (after the last stage)
//! Running(i) --Reject----> Rejected
//! Running(i) --Fatal-----> Errored
//! ```
//!
//! A stage's primary artifact joins the trail before the transition, so a
//! rejecting or failing stage that recorded something is still visible.

use lendflow_core::{AuditEntry, ErrorKind};
use lendflow_stages::{StageError, StageOutcome, StageReport};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("stage '{step}' failed: {source}")]
    Stage {
        step: String,
        #[source]
        source: StageError,
    },

    #[error("no stage at position {0}")]
    NoStage(usize),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Stage { source, .. } => source.kind(),
            Self::NoStage(_) => ErrorKind::Internal,
        }
    }
}

#[derive(Debug)]
pub enum WorkflowState {
    Running(usize),
    Rejected { reason: String, trail: Vec<AuditEntry> },
    Approved { result: Value, trail: Vec<AuditEntry> },
    Errored { error: WorkflowError, trail: Vec<AuditEntry> },
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running(_))
    }

    pub fn trail(&self) -> &[AuditEntry] {
        match self {
            Self::Running(_) => &[],
            Self::Rejected { trail, .. } | Self::Approved { trail, .. } | Self::Errored { trail, .. } => trail,
        }
    }

    /// Apply the report of the stage at the current position.
    ///
    /// `trail` accumulates while running and is moved into the terminal
    /// state. Terminal states are returned unchanged.
    pub fn advance(
        self,
        step: &str,
        report: StageReport,
        trail: &mut Vec<AuditEntry>,
        stage_count: usize,
    ) -> WorkflowState {
        let Self::Running(index) = self else {
            return self;
        };

        if let Some(cid) = report.primary {
            trail.push(AuditEntry::new(step, cid));
        }

        match report.outcome {
            StageOutcome::Continue(result) if index + 1 >= stage_count => Self::Approved {
                result,
                trail: std::mem::take(trail),
            },
            StageOutcome::Continue(_) => Self::Running(index + 1),
            StageOutcome::Reject(reason) => Self::Rejected {
                reason,
                trail: std::mem::take(trail),
            },
            StageOutcome::Fatal(source) => Self::Errored {
                error: WorkflowError::Stage {
                    step: step.to_string(),
                    source,
                },
                trail: std::mem::take(trail),
            },
        }
    }
}
