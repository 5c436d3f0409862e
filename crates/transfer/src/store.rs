use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{DOWNLOADING_DIR, TransferError, validate_task_id};

/// Task-scoped directory holding one ciphertext file per chunk index.
///
/// Lives at `<temp_root>/downloading/<task_id>/`; each chunk is stored
/// under its decimal index.
#[derive(Debug)]
pub struct EncryptedChunkStore {
    dir: PathBuf,
}

impl EncryptedChunkStore {
    /// Creates an empty store for `task_id`.
    ///
    /// Leftovers from an earlier run with the same ID are discarded.
    pub async fn create(temp_root: &Path, task_id: &str) -> Result<Self, TransferError> {
        validate_task_id(task_id)?;
        let dir = temp_root.join(DOWNLOADING_DIR).join(task_id);

        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(path = %dir.display(), "discarded stale chunk store"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&dir).await?;

        Ok(Self { dir })
    }

    /// Directory backing this store.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// File holding the ciphertext of chunk `index`.
    pub fn chunk_path(&self, index: u64) -> PathBuf {
        self.dir.join(index.to_string())
    }

    /// Persists the ciphertext of chunk `index`, replacing any earlier copy.
    pub async fn write_chunk(&self, index: u64, data: &[u8]) -> Result<(), TransferError> {
        tokio::fs::write(self.chunk_path(index), data).await?;
        Ok(())
    }

    /// Reads back the ciphertext of chunk `index`.
    pub async fn read_chunk(&self, index: u64) -> Result<Vec<u8>, TransferError> {
        match tokio::fs::read(self.chunk_path(index)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(TransferError::Protocol(format!(
                "chunk {index} was never received"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes the store and everything in it.
    pub async fn remove(self) -> Result<(), TransferError> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
