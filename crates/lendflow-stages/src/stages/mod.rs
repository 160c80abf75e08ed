//! One module per workflow stage, in pipeline order.

pub mod intent;
pub mod consent;
pub mod identity;
pub mod credit;
pub mod underwriting;
pub mod negotiation;
pub mod approval;
pub mod sanction;
pub mod disbursement;
pub mod monitoring;

pub use approval::ApprovalStage;
pub use consent::ConsentStage;
pub use credit::CreditAnalysisStage;
pub use disbursement::DisbursementStage;
pub use identity::IdentityStage;
pub use intent::IntentStage;
pub use monitoring::MonitoringStage;
pub use negotiation::NegotiationStage;
pub use sanction::SanctionStage;
pub use underwriting::UnderwritingStage;
