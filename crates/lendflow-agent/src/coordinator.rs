//! Workflow coordinator: walks the stage pipeline for one loan request

use crate::session::Session;
use crate::state::{WorkflowError, WorkflowState};
use lendflow_core::{ContentId, LoanRequest, LoanResponse, LoanStatus, PaymentData, SessionId};
use lendflow_stages::{
    default_pipeline, log_emi_payment, DomainData, PaymentReceipt, StageContext, StageOutcome,
    StagePipeline,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Progress notifications for observers of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    StageStarted { step: String },
    StageFinished { step: String, outcome: &'static str, content_id: Option<ContentId> },
    Finished { status: LoanStatus },
}

/// Terminal state of a run plus the data the stages accumulated.
#[derive(Debug)]
pub struct WorkflowOutcome {
    pub session_id: SessionId,
    pub state: WorkflowState,
    pub data: DomainData,
}

impl WorkflowOutcome {
    pub fn loan_id(&self) -> Option<&str> {
        self.data.loan_id()
    }

    pub fn status(&self) -> LoanStatus {
        match &self.state {
            WorkflowState::Approved { .. } => LoanStatus::Approved,
            WorkflowState::Rejected { .. } => LoanStatus::Rejected,
            WorkflowState::Errored { .. } | WorkflowState::Running(_) => LoanStatus::Error,
        }
    }

    pub fn into_response(self) -> LoanResponse {
        let loan_id = self.data.loan_id().map(str::to_string);
        match self.state {
            WorkflowState::Approved { trail, .. } => LoanResponse::approved(loan_id, trail),
            WorkflowState::Rejected { reason, trail } => LoanResponse::rejected(reason, trail),
            WorkflowState::Errored { error, trail } => {
                LoanResponse::error(error.kind(), error.to_string(), trail)
            }
            WorkflowState::Running(i) => {
                let error = WorkflowError::NoStage(i);
                LoanResponse::error(error.kind(), error.to_string(), Vec::new())
            }
        }
    }
}

pub struct WorkflowCoordinator {
    pipeline: StagePipeline,
    ctx: StageContext,
}

impl WorkflowCoordinator {
    /// Coordinator over the full loan pipeline.
    pub fn new(ctx: StageContext) -> Self {
        Self {
            pipeline: default_pipeline(),
            ctx,
        }
    }

    pub fn with_pipeline(mut self, pipeline: StagePipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn context(&self) -> &StageContext {
        &self.ctx
    }

    pub fn pipeline(&self) -> &StagePipeline {
        &self.pipeline
    }

    pub async fn run(&self, request: LoanRequest) -> WorkflowOutcome {
        self.drive(request, None).await
    }

    /// Like [`run`](Self::run), reporting progress on `events`. A closed
    /// receiver does not stop the run.
    pub async fn run_with_events(
        &self,
        request: LoanRequest,
        events: mpsc::Sender<WorkflowEvent>,
    ) -> WorkflowOutcome {
        self.drive(request, Some(events)).await
    }

    async fn drive(&self, request: LoanRequest, events: Option<mpsc::Sender<WorkflowEvent>>) -> WorkflowOutcome {
        let mut session = Session::new(request);
        let stage_count = self.pipeline.len();
        let mut state = WorkflowState::Running(0);

        info!(session = %session.id, stages = stage_count, "workflow started");

        while let WorkflowState::Running(index) = state {
            let Some(stage) = self.pipeline.get(index).cloned() else {
                state = WorkflowState::Errored {
                    error: WorkflowError::NoStage(index),
                    trail: std::mem::take(&mut session.trail),
                };
                break;
            };
            let step = stage.name().to_string();
            emit(&events, WorkflowEvent::StageStarted { step: step.clone() }).await;

            let report = stage.run(&session.id, &mut session.data, &self.ctx).await;
            let outcome = match &report.outcome {
                StageOutcome::Continue(_) => "continue",
                StageOutcome::Reject(_) => "reject",
                StageOutcome::Fatal(_) => "fatal",
            };
            let content_id = report.primary.clone();
            info!(session = %session.id, step = %step, outcome, "stage finished");

            state = state.advance(&step, report, &mut session.trail, stage_count);
            emit(&events, WorkflowEvent::StageFinished { step, outcome, content_id }).await;
        }

        match &state {
            WorkflowState::Approved { trail, .. } => {
                info!(session = %session.id, loan_id = ?session.data.loan_id(), steps = trail.len(),
                    elapsed_ms = session.elapsed_ms(), "workflow approved");
            }
            WorkflowState::Rejected { reason, trail } => {
                info!(session = %session.id, reason = %reason, steps = trail.len(),
                    elapsed_ms = session.elapsed_ms(), "workflow rejected");
            }
            WorkflowState::Errored { error, trail } => {
                warn!(session = %session.id, error = %error, kind = ?error.kind(), steps = trail.len(),
                    elapsed_ms = session.elapsed_ms(), "workflow failed");
            }
            WorkflowState::Running(_) => {}
        }

        let outcome = WorkflowOutcome {
            session_id: session.id,
            state,
            data: session.data,
        };
        emit(&events, WorkflowEvent::Finished { status: outcome.status() }).await;
        outcome
    }

    /// Log an EMI payment against a sanctioned loan outside of a run.
    pub async fn record_payment(
        &self,
        loan_id: &str,
        payment: &PaymentData,
    ) -> Result<PaymentReceipt, WorkflowError> {
        log_emi_payment(&self.ctx, loan_id, payment)
            .await
            .map_err(|source| WorkflowError::Stage {
                step: "monitoring".into(),
                source,
            })
    }
}

async fn emit(events: &Option<mpsc::Sender<WorkflowEvent>>, event: WorkflowEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}
