//! Queue statistics and cleanup reports.

use serde::{Deserialize, Serialize};

use crate::job::JobState;

/// Job counts per state, computed on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: u64,
    pub delayed: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub total: u64,
}

impl QueueStats {
    /// Assemble stats from per-state counts.
    pub fn from_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (JobState, u64)>,
    {
        let mut stats = Self::default();
        for (state, count) in counts {
            match state {
                JobState::Waiting => stats.waiting = count,
                JobState::Delayed => stats.delayed = count,
                JobState::Active => stats.active = count,
                JobState::Completed => stats.completed = count,
                JobState::Failed => stats.failed = count,
            }
        }
        stats.total = stats.waiting + stats.delayed + stats.active + stats.completed + stats.failed;
        stats
    }
}

/// Result of a retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSummary {
    /// Jobs removed in total.
    pub cleaned: usize,
    pub completed_cleaned: usize,
    pub failed_cleaned: usize,
    /// Batch records dropped from memory.
    pub batches_cleared: usize,
    /// Queue stats after the sweep.
    pub stats: QueueStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_sums_every_state() {
        let stats = QueueStats::from_counts([
            (JobState::Waiting, 2),
            (JobState::Delayed, 1),
            (JobState::Active, 3),
            (JobState::Completed, 10),
            (JobState::Failed, 4),
        ]);
        assert_eq!(stats.total, 20);
        assert_eq!(stats.delayed, 1);
    }

    #[test]
    fn test_cleanup_summary_wire_names() {
        let value = serde_json::to_value(CleanupSummary::default()).unwrap();
        assert!(value.get("completedCleaned").is_some());
        assert!(value.get("failedCleaned").is_some());
        assert_eq!(value["stats"]["total"], 0);
    }
}
