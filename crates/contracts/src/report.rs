//! Per-cycle diagnostics shared between the controller and observability.

use serde::{Deserialize, Serialize};

use crate::CycleStatus;

/// Summary of one scan cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub status: CycleStatus,
    pub segments_total: usize,
    /// Segments that reached `Extracted` before the deadline
    pub segments_ready: usize,
    pub malformed_buffers: usize,
    pub readback_errors: usize,
    /// Completions from earlier cycles that were discarded
    pub stale_discarded: usize,
    /// Outstanding requests cancelled before re-submission
    pub cancelled: usize,
    pub deadline_missed: bool,
    pub rows_copied: usize,
    pub rows_skipped: usize,
    pub geometry_inconsistencies: usize,
    /// Bins holding a return after filtering
    pub valid_returns: usize,
    pub duration_ms: f64,
}

impl CycleReport {
    pub fn is_degraded(&self) -> bool {
        self.status == CycleStatus::Degraded
    }
}
