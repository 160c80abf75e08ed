//! Lendflow Stages - the loan workflow's stage handlers
//!
//! Each stage is a self-contained file in src/stages/ implementing
//! [`StageHandler`]. To add a stage: create the file, implement the trait,
//! and place it in `default_pipeline()` below.

pub mod amortization;
pub mod context;
pub mod domain;
pub mod policy;
pub mod registry;
pub mod stages;

pub use context::{StageContext, WorkflowSettings};
pub use domain::*;
pub use policy::{PolicyTable, PolicyTier};
pub use registry::{StageError, StageHandler, StageOutcome, StagePipeline, StageReport};
pub use stages::monitoring::log_emi_payment;

/// The full loan origination pipeline, in execution order.
pub fn default_pipeline() -> StagePipeline {
    StagePipeline::new()
        .with(stages::IntentStage)
        .with(stages::ConsentStage)
        .with(stages::IdentityStage)
        .with(stages::CreditAnalysisStage)
        .with(stages::UnderwritingStage)
        .with(stages::NegotiationStage)
        .with(stages::ApprovalStage)
        .with(stages::SanctionStage)
        .with(stages::DisbursementStage)
        .with(stages::MonitoringStage)
}
