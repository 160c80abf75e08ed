//! Lendflow - ledger audit reporting shared by the `lendflow-audit` binary

pub mod report;

pub use report::{all_valid, format_records, format_summary, summarize, ChannelSummary};
