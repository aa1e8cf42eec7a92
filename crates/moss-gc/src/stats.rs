//! Collection statistics

use std::time::Duration;

/// Outcome of one collection cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Candidates in root ranges that named a tracked block
    pub roots: usize,
    /// Blocks marked reachable
    pub marked: usize,
    /// Blocks released by sweep
    pub reclaimed_blocks: usize,
    /// Payload bytes released by sweep
    pub reclaimed_bytes: usize,
    /// Blocks still registered after sweep
    pub surviving_blocks: usize,
    /// Wall time of mark + sweep
    pub pause: Duration,
    /// True if the cycle did not run (no usable stack anchor)
    pub skipped: bool,
}

impl CycleStats {
    pub(crate) fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Statistics of a collector over its lifetime
#[derive(Debug, Clone, Copy)]
pub struct CollectorStats {
    /// Blocks currently registered
    pub live_blocks: usize,
    /// Payload bytes currently registered
    pub live_bytes: usize,
    /// Cycles that ran to completion
    pub collection_count: usize,
    /// Cycles skipped for lack of a stack anchor
    pub skipped_count: usize,
    /// Most recent completed cycle
    pub last_cycle: Option<CycleStats>,
    /// Pause time accumulated across all cycles
    pub total_pause: Duration,
}
