//! Per-task result summaries

use std::fmt;

/// Block-level outcome counts for one task invocation.
///
/// Every task reports these four counters; per-block failures accumulate
/// here instead of aborting the task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSummary {
    /// Blocks handled without doubt (clean verify, unique hit, applied
    /// instruction).
    pub ok: u64,
    /// Blocks resolved to an ambiguous best candidate.
    pub ambiguous: u64,
    /// Blocks that could not be handled (mismatch, no hits, skipped).
    pub failed: u64,
    /// Blocks considered in total.
    pub total: u64,
}

impl TaskSummary {
    pub fn record_ok(&mut self) {
        self.ok += 1;
        self.total += 1;
    }

    pub fn record_ambiguous(&mut self) {
        self.ambiguous += 1;
        self.total += 1;
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
        self.total += 1;
    }
}

impl fmt::Display for TaskSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ok, {} ambiguous, {} failed, {} total",
            self.ok, self.ambiguous, self.failed, self.total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let mut summary = TaskSummary::default();
        summary.record_ok();
        summary.record_ok();
        summary.record_ambiguous();
        summary.record_failed();
        assert_eq!(
            summary,
            TaskSummary {
                ok: 2,
                ambiguous: 1,
                failed: 1,
                total: 4
            }
        );
        assert_eq!(summary.to_string(), "2 ok, 1 ambiguous, 1 failed, 4 total");
    }
}
