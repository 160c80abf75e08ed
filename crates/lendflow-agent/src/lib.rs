//! Lendflow Agent - workflow coordinator driving the stage pipeline

pub mod coordinator;
pub mod session;
pub mod state;

pub use coordinator::{WorkflowCoordinator, WorkflowEvent, WorkflowOutcome};
pub use session::Session;
pub use state::{WorkflowError, WorkflowState};
