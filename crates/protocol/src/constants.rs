use serde::{Deserialize, Serialize};

/// Highest server protocol version this client understands.
pub const PROTOCOL_VERSION: u32 = 3;

/// Response code signalling success.
pub const CODE_SUCCESS: i32 = 200;

/// Response code returned by `login` when the password must be changed first.
pub const CODE_PASSWORD_CHANGE_REQUIRED: i32 = 403;

/// Size of raw upload chunks in bytes.
pub const UPLOAD_CHUNK_SIZE: usize = 8192;

/// Download chunk size assumed when the server omits `chunk_size`.
pub const DEFAULT_DOWNLOAD_CHUNK_SIZE: u64 = 8192;

/// Maximum message size on dedicated transfer connections (4 MiB).
pub const TRANSFER_MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Plain-text acknowledgment: the receiver is ready for chunks.
pub const ACK_READY: &str = "ready";

/// Plain-text acknowledgment: the server already holds identical content.
pub const ACK_STOP: &str = "stop";

/// Action identifier carried by control and transfer frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    // Control requests
    #[serde(rename = "server_info")]
    ServerInfo,
    #[serde(rename = "login")]
    Login,
    #[serde(rename = "create_directory")]
    CreateDirectory,
    #[serde(rename = "list_directory")]
    ListDirectory,
    #[serde(rename = "create_document")]
    CreateDocument,
    #[serde(rename = "get_document")]
    GetDocument,
    #[serde(rename = "get_document_info")]
    GetDocumentInfo,
    #[serde(rename = "delete_document")]
    DeleteDocument,

    // Transfer handshake
    #[serde(rename = "upload_file")]
    UploadFile,
    #[serde(rename = "download_file")]
    DownloadFile,
    #[serde(rename = "transfer_file")]
    TransferFile,

    /// Forward compatibility: unknown actions deserialize here.
    #[serde(other)]
    Unknown,
}

impl Action {
    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ServerInfo => "server_info",
            Action::Login => "login",
            Action::CreateDirectory => "create_directory",
            Action::ListDirectory => "list_directory",
            Action::CreateDocument => "create_document",
            Action::GetDocument => "get_document",
            Action::GetDocumentInfo => "get_document_info",
            Action::DeleteDocument => "delete_document",
            Action::UploadFile => "upload_file",
            Action::DownloadFile => "download_file",
            Action::TransferFile => "transfer_file",
            Action::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_serialization() {
        assert_eq!(
            serde_json::to_string(&Action::TransferFile).unwrap(),
            "\"transfer_file\""
        );
        assert_eq!(
            serde_json::to_string(&Action::CreateDocument).unwrap(),
            "\"create_document\""
        );
    }

    #[test]
    fn action_deserialization() {
        let a: Action = serde_json::from_str("\"download_file\"").unwrap();
        assert_eq!(a, Action::DownloadFile);
    }

    #[test]
    fn unknown_action() {
        let a: Action = serde_json::from_str("\"rename_group\"").unwrap();
        assert_eq!(a, Action::Unknown);
    }

    #[test]
    fn as_str_matches_serde_name() {
        for action in [
            Action::ServerInfo,
            Action::Login,
            Action::GetDocument,
            Action::UploadFile,
            Action::TransferFile,
        ] {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
        }
    }
}
