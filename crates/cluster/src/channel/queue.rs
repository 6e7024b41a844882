//! Thread-safe unbounded queue
//!
//! The worker thread awaits `recv` on its own runtime; the producer enqueues
//! without ever blocking.

use async_channel::{unbounded, Receiver, Sender};
use contracts::{BatchReceiver, ContractError, WorkerId, WorkerMessage};

use super::BatchSender;
use crate::error::ClusterError;

/// Create a queue channel for `worker`.
pub fn channel(worker: WorkerId) -> (QueueSender, QueueReceiver) {
    let (tx, rx) = unbounded();
    (QueueSender { worker, tx }, QueueReceiver { worker, rx })
}

pub struct QueueSender {
    worker: WorkerId,
    tx: Sender<WorkerMessage>,
}

impl BatchSender for QueueSender {
    async fn send(&mut self, message: WorkerMessage) -> Result<(), ClusterError> {
        self.tx
            .try_send(message)
            .map_err(|_| ClusterError::ChannelClosed {
                worker: self.worker,
            })
    }
}

pub struct QueueReceiver {
    worker: WorkerId,
    rx: Receiver<WorkerMessage>,
}

impl BatchReceiver for QueueReceiver {
    async fn recv(&mut self) -> Result<WorkerMessage, ContractError> {
        self.rx.recv().await.map_err(|_| {
            ContractError::channel_closed(format!("queue for {} dropped", self.worker))
        })
    }
}
