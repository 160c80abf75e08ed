//! Per-run session state

use lendflow_core::{AuditEntry, LoanRequest, SessionId};
use lendflow_stages::DomainData;
use std::time::Instant;

/// One workflow run. Owned by the coordinator for the duration of the run
/// and dropped afterwards; never persisted.
pub struct Session {
    pub id: SessionId,
    pub trail: Vec<AuditEntry>,
    pub data: DomainData,
    started: Instant,
}

impl Session {
    pub fn new(request: LoanRequest) -> Self {
        Self {
            id: SessionId::random(),
            trail: Vec::new(),
            data: DomainData::new(request),
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}
