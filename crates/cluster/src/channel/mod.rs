//! Worker channels
//!
//! Every transport implements [`BatchSender`] on the producer side and
//! [`contracts::BatchReceiver`] on the worker side, so neither the dispatcher
//! nor a backend task ever needs to know which transport it is talking to.
//!
//! - [`pipe`]: length-prefixed bincode frames over a child process's stdio
//! - [`queue`]: unbounded thread-safe queue, for OS-thread workers
//! - [`local`]: unbounded in-runtime queue, for cooperative tasks

pub mod local;
pub mod pipe;
pub mod queue;

use contracts::WorkerMessage;

use crate::error::ClusterError;

/// Producer end of a worker channel.
///
/// A send either hands the message to the transport or reports that the
/// consumer is gone; it never waits for the worker to process it.
#[trait_variant::make(BatchSender: Send)]
pub trait LocalBatchSender {
    async fn send(&mut self, message: WorkerMessage) -> Result<(), ClusterError>;
}
