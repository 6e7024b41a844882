//! In-runtime unbounded queue for cooperative tasks.

use contracts::{BatchReceiver, ContractError, WorkerId, WorkerMessage};
use tokio::sync::mpsc;

use super::BatchSender;
use crate::error::ClusterError;

/// Create a local channel for `worker`.
pub fn channel(worker: WorkerId) -> (LocalSender, LocalReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (LocalSender { worker, tx }, LocalReceiver { worker, rx })
}

pub struct LocalSender {
    worker: WorkerId,
    tx: mpsc::UnboundedSender<WorkerMessage>,
}

impl BatchSender for LocalSender {
    async fn send(&mut self, message: WorkerMessage) -> Result<(), ClusterError> {
        self.tx.send(message).map_err(|_| ClusterError::ChannelClosed {
            worker: self.worker,
        })
    }
}

pub struct LocalReceiver {
    worker: WorkerId,
    rx: mpsc::UnboundedReceiver<WorkerMessage>,
}

impl BatchReceiver for LocalReceiver {
    async fn recv(&mut self) -> Result<WorkerMessage, ContractError> {
        self.rx.recv().await.ok_or_else(|| {
            ContractError::channel_closed(format!("local queue for {} dropped", self.worker))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closed_sender_ends_receiver() {
        let (tx, mut rx) = channel(WorkerId(0));
        drop(tx);
        assert!(rx.recv().await.is_err());
    }
}
