//! BatchReceiver trait - consumer end of a worker channel
//!
//! Every transport (byte-stream pipe, thread-safe queue, in-process queue)
//! implements this one receive operation natively, so a backend task never
//! needs to know which transport it is bound to.

use crate::{ContractError, WorkerMessage};

/// Consumer-side endpoint of a worker channel.
#[trait_variant::make(BatchReceiver: Send)]
pub trait LocalBatchReceiver {
    /// Wait for the next message.
    ///
    /// Suspends while the channel is empty.
    ///
    /// # Errors
    /// Returns `ChannelClosed` once the producer end is gone without having
    /// sent the shutdown sentinel, or a codec error on byte-stream transports.
    async fn recv(&mut self) -> Result<WorkerMessage, ContractError>;
}
