//! Child side of the process-isolated cluster.
//!
//! A worker process reads batches from stdin and talks back on stdout, so it
//! must never print anything else there.

use contracts::{BackendTask, TaskReport};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error};

use crate::channel::pipe::{write_frame, ControlFrame, PipeReceiver};
use crate::error::ClusterError;

/// Run `task` over this process's stdin and stdout.
pub async fn serve_worker<T: BackendTask>(task: T) -> Result<TaskReport, ClusterError> {
    serve_worker_on(task, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Run `task` reading batches from `input` and writing control frames to
/// `output`: `Ready` first, then exactly one of `Finished` or `Failed`.
pub async fn serve_worker_on<T, R, W>(
    task: T,
    input: R,
    mut output: W,
) -> Result<TaskReport, ClusterError>
where
    T: BackendTask,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let pid = std::process::id();
    write_frame(&mut output, &ControlFrame::Ready { pid }).await?;
    debug!(pid, "worker ready");

    match task.run(PipeReceiver::new(input)).await {
        Ok(report) => {
            write_frame(&mut output, &ControlFrame::Finished(report)).await?;
            Ok(report)
        }
        Err(e) => {
            error!(pid, error = %e, "backend task failed");
            write_frame(
                &mut output,
                &ControlFrame::Failed {
                    message: e.to_string(),
                },
            )
            .await?;
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::pipe::{read_frame, PipeSender};
    use crate::channel::BatchSender;
    use crate::testing::{Journal, RecordingTask};
    use contracts::{Batch, UserRecord, WorkerId, WorkerMessage};

    #[tokio::test]
    async fn test_worker_handshake_and_report() {
        let (parent_in, child_in) = tokio::io::duplex(1024);
        let (child_out, mut parent_out) = tokio::io::duplex(1024);

        let journal = Journal::default();
        let task = RecordingTask::new(WorkerId(0), journal.clone());
        let child = tokio::spawn(serve_worker_on(task, child_in, child_out));

        let ready: Option<ControlFrame> = read_frame(&mut parent_out).await.unwrap();
        assert!(matches!(ready, Some(ControlFrame::Ready { .. })));

        let mut tx = PipeSender::new(WorkerId(0), parent_in);
        tx.send(WorkerMessage::Batch(Batch::new(vec![UserRecord::new("u1", "u1@x", 20)])))
            .await
            .unwrap();
        tx.send(WorkerMessage::Shutdown).await.unwrap();
        drop(tx);

        let done: Option<ControlFrame> = read_frame(&mut parent_out).await.unwrap();
        let report = child.await.unwrap().unwrap();
        assert_eq!(done, Some(ControlFrame::Finished(report)));
        assert_eq!(report.records_inserted, 1);
        assert_eq!(journal.usernames(WorkerId(0)), vec!["u1"]);
    }

    #[tokio::test]
    async fn test_failed_task_reports_failure() {
        let (parent_in, child_in) = tokio::io::duplex(64);
        let (child_out, mut parent_out) = tokio::io::duplex(1024);
        drop(parent_in);

        let task = RecordingTask::new(WorkerId(0), Journal::default()).strict();
        let result = serve_worker_on(task, child_in, child_out).await;
        assert!(result.is_err());

        let _ready: Option<ControlFrame> = read_frame(&mut parent_out).await.unwrap();
        let failed: Option<ControlFrame> = read_frame(&mut parent_out).await.unwrap();
        assert!(matches!(failed, Some(ControlFrame::Failed { .. })));
    }
}
