//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the migration workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Data flow
//! - `RecordSource` yields pages of `UserRecord`s, which the driver wraps into `Batch`es
//! - each `Batch` travels to exactly one worker as a `WorkerMessage::Batch`
//! - every worker receives exactly one `WorkerMessage::Shutdown` after all data
//! - a `BackendTask` drains its `BatchReceiver` into a `RecordSink`

mod channel;
mod config;
mod error;
mod record;
mod sink;
mod source;
mod task;

pub use channel::{BatchReceiver, LocalBatchReceiver};
pub use config::*;
pub use error::*;
pub use record::*;
pub use sink::{LocalRecordSink, RecordSink};
pub use source::{LocalRecordSource, RecordSource};
pub use task::{BackendTask, TaskReport};
