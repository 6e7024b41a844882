//! Dispatch bookkeeping shared by every cluster variant.

use std::fmt;

use contracts::WorkerId;

/// Cluster lifecycle
///
/// `Created → Running → Drained`; a failed startup lands in `Failed` and the
/// cluster can no longer be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Running,
    Drained,
    Failed,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Drained => "drained",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Round-robin counters
///
/// Only the producer mutates this, so plain integers are enough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchState {
    cluster_size: usize,
    dispatched: u64,
    records_submitted: u64,
    lost_batches: u64,
}

impl DispatchState {
    /// `cluster_size` must be at least 1.
    pub fn new(cluster_size: usize) -> Self {
        debug_assert!(cluster_size > 0, "cluster size must be positive");
        Self {
            cluster_size,
            dispatched: 0,
            records_submitted: 0,
            lost_batches: 0,
        }
    }

    /// Worker that receives the next batch.
    pub fn select(&self) -> WorkerId {
        WorkerId((self.dispatched % self.cluster_size as u64) as usize)
    }

    /// Count a submitted batch of `records` records.
    pub fn advance(&mut self, records: usize) {
        self.dispatched += 1;
        self.records_submitted += records as u64;
    }

    pub fn record_lost(&mut self) {
        self.lost_batches += 1;
    }

    pub fn cluster_size(&self) -> usize {
        self.cluster_size
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn records_submitted(&self) -> u64 {
        self.records_submitted
    }

    pub fn lost_batches(&self) -> u64 {
        self.lost_batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_is_counter_mod_size() {
        let mut state = DispatchState::new(3);
        let mut picks = Vec::new();
        for _ in 0..7 {
            picks.push(state.select().index());
            state.advance(2);
        }
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(state.dispatched(), 7);
        assert_eq!(state.records_submitted(), 14);
    }

    #[test]
    fn test_assignment_is_fair_for_any_shape() {
        for size in 1..=9usize {
            for batches in 0..=40u64 {
                let mut state = DispatchState::new(size);
                let mut per_worker = vec![0u64; size];
                for _ in 0..batches {
                    per_worker[state.select().index()] += 1;
                    state.advance(1);
                }
                let floor = batches / size as u64;
                let ceil = batches.div_ceil(size as u64);
                assert!(
                    per_worker.iter().all(|n| *n == floor || *n == ceil),
                    "size={size} batches={batches} got {per_worker:?}"
                );
            }
        }
    }

    #[test]
    fn test_lost_batches_do_not_change_rotation() {
        let mut state = DispatchState::new(2);
        state.record_lost();
        state.advance(5);
        assert_eq!(state.select(), WorkerId(1));
        assert_eq!(state.lost_batches(), 1);
    }
}
