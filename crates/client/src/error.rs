use cfms_connection::{ConnectionError, RpcError};
use cfms_transfer::TransferError;

/// Errors produced by the client layer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("connection failed: {0}")]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("server uses protocol version {server}, this client supports up to {client}")]
    ProtocolTooNew { server: u32, client: u32 },

    #[error("failed to create directory {name}: {message}")]
    CreateDirectoryFailed { name: String, message: String },

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ClientError {
    /// Returns `true` if retrying on a fresh connection may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Connection(_) => true,
            ClientError::Rpc(e) => e.is_transport(),
            ClientError::Transfer(e) => e.is_transport(),
            _ => false,
        }
    }
}
