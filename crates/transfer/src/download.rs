//! Download pipeline.
//!
//! ```text
//! → {"action": "download_file", "data": {"task_id": ...}}
//! ← {"action": "transfer_file", "data": {sha256, file_size, chunk_size, total_chunks}}
//! → "ready"
//! ← {"data": {"index": n, "iv": ..., "hash": ..., "chunk": ...}}   × total_chunks
//! ← {"data": {"key": ...}}
//! ```
//!
//! Ciphertext chunks are persisted to an [`EncryptedChunkStore`] as they
//! arrive. The key is only sent after the last chunk, so decryption is a
//! separate phase that walks the store in index order.

use std::io::ErrorKind;
use std::path::Path;

use cfms_protocol::constants::Action;
use cfms_protocol::{Ack, ActionFrame, ChunkFrame, DownloadMetadata, FrameChannel, KeyFrame, TaskRef};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::frames::{recv_json, recv_transfer_reply, send_json, send_text};
use crate::progress::emit;
use crate::{
    ChunkDecryptor, Direction, DownloadProgress, DownloadReport, EncryptedChunkStore,
    TransferError, TransferTask, sha256_of, validate_task_id,
};

enum DownloadState {
    Init,
    /// Task request sent, waiting for the metadata reply.
    Metadata,
    /// `ready` sent.
    AckSent { meta: DownloadMetadata },
    Receiving {
        meta: DownloadMetadata,
        received: u64,
        iv: Option<Vec<u8>>,
    },
    /// Every chunk is stored; waiting for the key.
    KeyAwait { meta: DownloadMetadata, iv: Vec<u8> },
    Decrypting {
        meta: DownloadMetadata,
        decryptor: ChunkDecryptor,
        output: tokio::fs::File,
        next: u64,
    },
    Cleanup { meta: DownloadMetadata },
    Verify { meta: DownloadMetadata },
}

enum Transition {
    Next(DownloadState),
    Finished(DownloadReport),
}

fn advance(state: DownloadState) -> Result<Transition, TransferError> {
    Ok(Transition::Next(state))
}

/// Downloads, decrypts and verifies one file over a dedicated transfer channel.
///
/// Chunks are staged under `<temp_root>/downloading/<task_id>/`. On any
/// failure the staging directory and a partially written destination file
/// are removed before the error is returned. The channel is left open for
/// the caller to close.
pub async fn download_file<C>(
    channel: &mut C,
    task: &TransferTask,
    temp_root: &Path,
    progress_tx: &mpsc::Sender<DownloadProgress>,
    cancel: &CancellationToken,
) -> Result<DownloadReport, TransferError>
where
    C: FrameChannel + ?Sized,
{
    if task.direction != Direction::Download {
        return Err(TransferError::InvalidTask(format!(
            "task {} is not a download",
            task.task_id
        )));
    }
    validate_task_id(&task.task_id)?;

    let mut run = DownloadRun {
        channel,
        task,
        temp_root,
        progress_tx,
        cancel,
        store: None,
        output_created: false,
    };
    run.drive().await
}

struct DownloadRun<'a, C: ?Sized> {
    channel: &'a mut C,
    task: &'a TransferTask,
    temp_root: &'a Path,
    progress_tx: &'a mpsc::Sender<DownloadProgress>,
    cancel: &'a CancellationToken,
    store: Option<EncryptedChunkStore>,
    output_created: bool,
}

impl<C> DownloadRun<'_, C>
where
    C: FrameChannel + ?Sized,
{
    async fn drive(&mut self) -> Result<DownloadReport, TransferError> {
        let mut state = DownloadState::Init;
        loop {
            match self.step(state).await {
                Ok(Transition::Finished(report)) => {
                    info!(
                        task_id = %self.task.task_id,
                        file_size = report.file_size,
                        chunks = report.total_chunks,
                        "download finished"
                    );
                    return Ok(report);
                }
                Ok(Transition::Next(next)) => state = next,
                Err(e) => {
                    if e.is_integrity() {
                        warn!(
                            task_id = %self.task.task_id,
                            error = %e,
                            "verification failed, discarding output"
                        );
                    } else {
                        warn!(task_id = %self.task.task_id, error = %e, "download failed");
                    }
                    self.discard().await;
                    return Err(e);
                }
            }
        }
    }

    async fn step(&mut self, state: DownloadState) -> Result<Transition, TransferError> {
        let task = self.task;
        let task_id = task.task_id.as_str();

        match state {
            DownloadState::Init => {
                let request = ActionFrame::new(
                    Action::DownloadFile,
                    TaskRef {
                        task_id: task_id.to_string(),
                    },
                );
                send_json(&mut *self.channel, &request).await?;
                advance(DownloadState::Metadata)
            }

            DownloadState::Metadata => {
                let meta: DownloadMetadata = recv_transfer_reply(&mut *self.channel).await?;
                debug!(
                    task_id,
                    file_size = meta.file_size,
                    chunk_size = meta.chunk_size,
                    total_chunks = meta.total_chunks,
                    "download metadata received"
                );
                send_text(&mut *self.channel, Ack::Ready.as_str()).await?;
                advance(DownloadState::AckSent { meta })
            }

            DownloadState::AckSent { meta } => {
                self.store = Some(EncryptedChunkStore::create(self.temp_root, task_id).await?);

                if meta.file_size == 0 {
                    tokio::fs::File::create(&task.file_path).await?;
                    self.output_created = true;
                    self.remove_store().await;
                    return Ok(Transition::Finished(DownloadReport {
                        file_size: 0,
                        total_chunks: 0,
                        sha256_verified: false,
                    }));
                }

                advance(DownloadState::Receiving {
                    meta,
                    received: 0,
                    iv: None,
                })
            }

            DownloadState::Receiving {
                meta,
                received,
                iv,
            } if received == meta.total_chunks => {
                let iv = iv.ok_or_else(|| {
                    TransferError::Protocol("no initialization vector received".into())
                })?;
                advance(DownloadState::KeyAwait { meta, iv })
            }

            DownloadState::Receiving {
                meta,
                received,
                mut iv,
            } => {
                if self.cancel.is_cancelled() {
                    debug!(task_id, received, "download cancelled");
                    return Err(TransferError::Cancelled);
                }

                let frame: ChunkFrame = recv_json(&mut *self.channel).await?;
                let chunk = frame.data;
                if chunk.index >= meta.total_chunks {
                    return Err(TransferError::Protocol(format!(
                        "chunk index {} out of range (total {})",
                        chunk.index, meta.total_chunks
                    )));
                }
                if chunk.index == 0 {
                    let chunk_iv = chunk.iv.ok_or_else(|| {
                        TransferError::Protocol("chunk 0 carries no initialization vector".into())
                    })?;
                    iv = Some(chunk_iv);
                }

                self.store()?.write_chunk(chunk.index, &chunk.chunk).await?;

                let received = received + 1;
                let estimate = if received == meta.total_chunks {
                    meta.file_size
                } else {
                    meta.chunk_size.saturating_mul(received)
                };
                emit(
                    self.progress_tx,
                    DownloadProgress::Receiving {
                        received: estimate,
                        total: meta.file_size,
                    },
                )
                .await;

                advance(DownloadState::Receiving { meta, received, iv })
            }

            DownloadState::KeyAwait { meta, iv } => {
                let frame: KeyFrame = recv_json(&mut *self.channel).await?;
                let decryptor = ChunkDecryptor::new(&frame.data.key, &iv)?;
                let output = tokio::fs::File::create(&task.file_path).await?;
                self.output_created = true;
                debug!(task_id, "key received, decrypting");
                advance(DownloadState::Decrypting {
                    meta,
                    decryptor,
                    output,
                    next: 0,
                })
            }

            DownloadState::Decrypting {
                meta,
                mut decryptor,
                mut output,
                next,
            } => {
                if next == meta.total_chunks {
                    output.flush().await?;
                    return advance(DownloadState::Cleanup { meta });
                }

                emit(
                    self.progress_tx,
                    DownloadProgress::Decrypting {
                        decrypted: next + 1,
                        total: meta.total_chunks,
                    },
                )
                .await;

                let mut data = self.store()?.read_chunk(next).await?;
                decryptor.decrypt(&mut data);
                output.write_all(&data).await?;

                advance(DownloadState::Decrypting {
                    meta,
                    decryptor,
                    output,
                    next: next + 1,
                })
            }

            DownloadState::Cleanup { meta } => {
                emit(self.progress_tx, DownloadProgress::Cleaning).await;
                self.remove_store().await;
                advance(DownloadState::Verify { meta })
            }

            DownloadState::Verify { meta } => {
                emit(self.progress_tx, DownloadProgress::Verifying).await;

                let actual = tokio::fs::metadata(&task.file_path).await?.len();
                if actual != meta.file_size {
                    return Err(TransferError::SizeMismatch {
                        expected: meta.file_size,
                        got: actual,
                    });
                }

                let expected = meta.sha256.as_deref().filter(|digest| !digest.is_empty());
                let sha256_verified = match expected {
                    Some(expected) => {
                        let got = sha256_of(&task.file_path).await?;
                        if !got.eq_ignore_ascii_case(expected) {
                            return Err(TransferError::HashMismatch {
                                expected: expected.to_string(),
                                got,
                            });
                        }
                        true
                    }
                    None => false,
                };

                Ok(Transition::Finished(DownloadReport {
                    file_size: meta.file_size,
                    total_chunks: meta.total_chunks,
                    sha256_verified,
                }))
            }
        }
    }

    fn store(&self) -> Result<&EncryptedChunkStore, TransferError> {
        self.store
            .as_ref()
            .ok_or_else(|| TransferError::Protocol("chunk store not initialized".into()))
    }

    async fn remove_store(&mut self) {
        if let Some(store) = self.store.take() {
            let path = store.path().to_path_buf();
            if let Err(e) = store.remove().await {
                warn!(path = %path.display(), error = %e, "failed to remove chunk store");
            }
        }
    }

    /// Removes everything a failed run left behind.
    async fn discard(&mut self) {
        self.remove_store().await;
        if self.output_created {
            match tokio::fs::remove_file(&self.task.file_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(
                    path = %self.task.file_path.display(),
                    error = %e,
                    "failed to remove partial download"
                ),
            }
            self.output_created = false;
        }
    }
}
