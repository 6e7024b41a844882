//! Records, batches and the messages that carry them to workers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One user row moved from the document store to the relational store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub email: String,
    pub age: i32,
}

impl UserRecord {
    pub fn new(username: impl Into<String>, email: impl Into<String>, age: i32) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            age,
        }
    }
}

/// An ordered page of records handed to a single worker.
///
/// Ownership moves from the producer into the selected worker channel; a batch
/// is never shared between workers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch(Vec<UserRecord>);

impl Batch {
    pub fn new(records: Vec<UserRecord>) -> Self {
        Self(records)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn records(&self) -> &[UserRecord] {
        &self.0
    }

    pub fn into_records(self) -> Vec<UserRecord> {
        self.0
    }
}

impl From<Vec<UserRecord>> for Batch {
    fn from(records: Vec<UserRecord>) -> Self {
        Self(records)
    }
}

impl IntoIterator for Batch {
    type Item = UserRecord;
    type IntoIter = std::vec::IntoIter<UserRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Value travelling over a worker channel.
///
/// `Shutdown` is the sentinel: it is always the last message a worker receives,
/// and it is never confused with a data batch regardless of the batch length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerMessage {
    Batch(Batch),
    Shutdown,
}

impl WorkerMessage {
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }
}

/// Zero-based position of a worker in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub usize);

impl WorkerId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0 + 1)
    }
}
