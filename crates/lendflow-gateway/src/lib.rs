//! Lendflow Gateway - HTTP surface for loan workflows and ledger audit

pub mod auth;
pub mod config;
pub mod server;

pub use config::LendflowConfig;
pub use server::{build_state, router, start_gateway, AppState};
