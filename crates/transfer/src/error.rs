use cfms_protocol::TransportError;

/// Errors produced by the transfer pipelines.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Unexpected action, acknowledgment or malformed frame during a handshake.
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("file size mismatch: expected {expected}, got {got}")]
    SizeMismatch { expected: u64, got: u64 },

    #[error("file hash mismatch: expected {expected}, got {got}")]
    HashMismatch { expected: String, got: String },

    #[error("cancelled")]
    Cancelled,

    #[error("invalid task: {0}")]
    InvalidTask(String),
}

impl TransferError {
    /// Returns `true` for faults a caller may retry on a fresh connection.
    pub fn is_transport(&self) -> bool {
        matches!(self, TransferError::Transport(_))
    }

    /// Returns `true` for post-transfer integrity failures.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            TransferError::SizeMismatch { .. } | TransferError::HashMismatch { .. }
        )
    }
}
