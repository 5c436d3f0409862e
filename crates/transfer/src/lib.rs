//! Bulk file transfer over a dedicated connection.
//!
//! Uploads stream raw 8 KiB chunks after a hash/size handshake. Downloads
//! receive indexed ciphertext chunks into a per-task store, wait for the
//! deferred key, decrypt in index order, and verify the result.

mod chunked;
mod cipher;
mod digest;
mod download;
mod error;
mod frames;
mod progress;
mod store;
mod types;
mod upload;
mod validation;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use chunked::ChunkReader;
pub use cipher::ChunkDecryptor;
#[cfg(any(test, feature = "test-util"))]
pub use cipher::ChunkEncryptor;
pub use digest::{calculate_file_checksum, checksum_bytes, sha256_if_nonempty, sha256_of};
pub use download::download_file;
pub use error::TransferError;
pub use progress::{DownloadProgress, UploadProgress};
pub use store::EncryptedChunkStore;
pub use types::{Direction, DownloadReport, TransferTask, UploadReport};
pub use upload::upload_file;
pub use validation::validate_task_id;

/// Name of the chunk-store directory under the temporary-storage root.
pub const DOWNLOADING_DIR: &str = "downloading";
