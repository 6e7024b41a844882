//! BackendTask - the unit of work each worker runs to completion

use std::future::Future;
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::{BatchReceiver, ContractError};

/// Work executed by one worker for the whole lifetime of the pool.
///
/// A task repeatedly receives one message from its channel, persists batches,
/// and returns once it sees the shutdown sentinel. A fresh instance is created
/// for every worker; instances are never shared.
pub trait BackendTask: Send + 'static {
    /// Drain `rx` until the shutdown sentinel arrives.
    ///
    /// Per-batch failures are contained inside the task and reported through
    /// [`TaskReport`]; an `Err` means the task could not run at all.
    fn run<R>(self, rx: R) -> impl Future<Output = Result<TaskReport, ContractError>> + Send
    where
        R: BatchReceiver + 'static;
}

/// Counters reported by a backend task when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    /// Data batches taken off the channel
    pub batches_received: u64,
    /// Records the sink accepted
    pub records_inserted: u64,
    /// Batches with at least one rejected insert
    pub failed_batches: u64,
    /// Records the sink rejected
    pub failed_records: u64,
}

impl AddAssign for TaskReport {
    fn add_assign(&mut self, rhs: Self) {
        self.batches_received += rhs.batches_received;
        self.records_inserted += rhs.records_inserted;
        self.failed_batches += rhs.failed_batches;
        self.failed_records += rhs.failed_records;
    }
}
