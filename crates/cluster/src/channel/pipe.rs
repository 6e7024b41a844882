//! Byte-stream channel to a worker process
//!
//! Frame layout: `u32` little-endian payload length, then a bincode payload.
//! Batches travel parent → child on the child's stdin; [`ControlFrame`]s
//! travel child → parent on its stdout.

use contracts::{BatchReceiver, ContractError, TaskReport, WorkerId, WorkerMessage};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::BatchSender;
use crate::error::ClusterError;

/// Upper bound on a single frame payload
pub const MAX_FRAME_LEN: u32 = 256 * 1024 * 1024;

/// Messages a worker process reports back on its stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlFrame {
    /// Channel established, worker can receive
    Ready { pid: u32 },
    /// Task returned normally
    Finished(TaskReport),
    /// Task could not run
    Failed { message: String },
}

/// Write one frame and flush it.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), ContractError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload =
        bincode::serialize(value).map_err(|e| ContractError::channel_codec(e.to_string()))?;
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_LEN)
        .ok_or_else(|| {
            ContractError::channel_codec(format!("frame of {} bytes too large", payload.len()))
        })?;

    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. `None` means the stream ended cleanly between frames.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, ContractError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(prefix);
    if len > MAX_FRAME_LEN {
        return Err(ContractError::channel_codec(format!(
            "frame length {len} exceeds limit"
        )));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    bincode::deserialize(&payload)
        .map(Some)
        .map_err(|e| ContractError::channel_codec(e.to_string()))
}

/// Parent side: writes batches to a worker's stdin.
pub struct PipeSender<W> {
    worker: WorkerId,
    writer: W,
}

impl<W> PipeSender<W> {
    pub fn new(worker: WorkerId, writer: W) -> Self {
        Self { worker, writer }
    }
}

impl<W> BatchSender for PipeSender<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, message: WorkerMessage) -> Result<(), ClusterError> {
        write_frame(&mut self.writer, &message)
            .await
            .map_err(|e| match e {
                ContractError::Io(io) if io.kind() == std::io::ErrorKind::BrokenPipe => {
                    ClusterError::ChannelClosed {
                        worker: self.worker,
                    }
                }
                other => ClusterError::channel_io(self.worker, other.to_string()),
            })
    }
}

/// Child side: reads batches from stdin.
pub struct PipeReceiver<R> {
    reader: R,
}

impl<R> PipeReceiver<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R> BatchReceiver for PipeReceiver<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn recv(&mut self) -> Result<WorkerMessage, ContractError> {
        read_frame(&mut self.reader)
            .await?
            .ok_or_else(|| ContractError::channel_closed("pipe closed before shutdown"))
    }
}
