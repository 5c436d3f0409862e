//! Upload pipeline.
//!
//! ```text
//! → {"action": "upload_file", "data": {"task_id": ...}}
//! ← {"action": "transfer_file", ...}
//! → {"action": "transfer_file", "data": {"sha256": ..., "file_size": ...}}
//! ← "ready" | "stop"
//! → <binary chunk> ...
//! ```

use cfms_protocol::constants::{Action, UPLOAD_CHUNK_SIZE};
use cfms_protocol::{Ack, ActionFrame, Frame, FrameChannel, TaskRef, UploadMetadata};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::frames::{recv_text, recv_transfer_reply, send_json};
use crate::progress::emit;
use crate::{
    ChunkReader, Direction, TransferError, TransferTask, UploadProgress, UploadReport,
    sha256_if_nonempty,
};

enum UploadState {
    /// Nothing sent yet.
    Init,
    /// Task request sent, waiting for the server to open the transfer.
    AwaitingOpen,
    /// Size and digest sent, waiting for `ready` or `stop`.
    Announced { file_size: u64 },
    Streaming { reader: ChunkReader },
    Done(UploadReport),
}

/// Uploads `task.file_path` over a dedicated transfer channel.
///
/// Progress is reported after every chunk frame. The cancellation token is
/// checked once per chunk; the channel is left open for the caller to close.
pub async fn upload_file<C>(
    channel: &mut C,
    task: &TransferTask,
    progress_tx: &mpsc::Sender<UploadProgress>,
    cancel: &CancellationToken,
) -> Result<UploadReport, TransferError>
where
    C: FrameChannel + ?Sized,
{
    if task.direction != Direction::Upload {
        return Err(TransferError::InvalidTask(format!(
            "task {} is not an upload",
            task.task_id
        )));
    }

    let task_id = task.task_id.as_str();
    let mut state = UploadState::Init;

    loop {
        state = match state {
            UploadState::Init => {
                let request = ActionFrame::new(
                    Action::UploadFile,
                    TaskRef {
                        task_id: task_id.to_string(),
                    },
                );
                send_json(channel, &request).await?;
                UploadState::AwaitingOpen
            }

            UploadState::AwaitingOpen => {
                let _: serde_json::Value = recv_transfer_reply(channel).await?;

                let file_size = tokio::fs::metadata(&task.file_path).await?.len();
                let sha256 = sha256_if_nonempty(&task.file_path, file_size).await?;
                debug!(task_id, file_size, sha256 = ?sha256, "announcing upload");

                let announce =
                    ActionFrame::new(Action::TransferFile, UploadMetadata { sha256, file_size });
                send_json(channel, &announce).await?;
                UploadState::Announced { file_size }
            }

            UploadState::Announced { file_size } => {
                let text = recv_text(channel).await?;
                match Ack::parse(&text) {
                    Some(Ack::Stop) => {
                        info!(task_id, "server already holds this content, skipping upload");
                        UploadState::Done(UploadReport {
                            bytes_sent: 0,
                            file_size,
                            skipped: true,
                        })
                    }
                    Some(Ack::Ready) if file_size == 0 => UploadState::Done(UploadReport {
                        bytes_sent: 0,
                        file_size,
                        skipped: false,
                    }),
                    Some(Ack::Ready) => {
                        let reader = ChunkReader::open(&task.file_path, UPLOAD_CHUNK_SIZE).await?;
                        UploadState::Streaming { reader }
                    }
                    None => {
                        return Err(TransferError::Protocol(format!(
                            "unexpected acknowledgment: {text:?}"
                        )));
                    }
                }
            }

            UploadState::Streaming { mut reader } => {
                if cancel.is_cancelled() {
                    debug!(task_id, sent = reader.offset(), "upload cancelled");
                    return Err(TransferError::Cancelled);
                }

                let file_size = reader.file_size();
                let chunk = reader.next_chunk().await?;
                let last = chunk.len() < reader.chunk_size();
                channel.send(Frame::Binary(chunk)).await?;
                emit(
                    progress_tx,
                    UploadProgress {
                        sent: reader.offset(),
                        total: file_size,
                    },
                )
                .await;

                if last {
                    UploadState::Done(UploadReport {
                        bytes_sent: reader.offset(),
                        file_size,
                        skipped: false,
                    })
                } else {
                    UploadState::Streaming { reader }
                }
            }

            UploadState::Done(report) => {
                info!(
                    task_id,
                    bytes_sent = report.bytes_sent,
                    skipped = report.skipped,
                    "upload finished"
                );
                return Ok(report);
            }
        };
    }
}
