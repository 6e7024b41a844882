//! RecordSink trait - relational store write interface
//!
//! Defines the abstract interface a backend task persists batches into.

use crate::{ContractError, UserRecord};

/// Record output trait
///
/// Every sink owns its connection exclusively: one sink per worker, opened when
/// the worker starts and closed when it stops.
#[trait_variant::make(RecordSink: Send)]
pub trait LocalRecordSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Insert a single record
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn insert_one(&mut self, record: &UserRecord) -> Result<(), ContractError>;

    /// Insert a group of records in one round-trip
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn insert_many(&mut self, records: &[UserRecord]) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
