use serde::{Deserialize, Serialize};

use crate::constants::{ACK_READY, ACK_STOP, Action, DEFAULT_DOWNLOAD_CHUNK_SIZE};

// ---------------------------------------------------------------------------
// Handshake frames
// ---------------------------------------------------------------------------

/// A transfer-channel frame: `{"action": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionFrame<T> {
    pub action: Action,
    #[serde(default)]
    pub data: T,
}

impl<T> ActionFrame<T> {
    pub fn new(action: Action, data: T) -> Self {
        Self { action, data }
    }
}

/// Identifies the task a dedicated connection works on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRef {
    pub task_id: String,
}

/// Sent by the uploader after the server opened the transfer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadMetadata {
    /// `None` for empty files.
    pub sha256: Option<String>,
    pub file_size: u64,
}

/// Announced by the server before any download chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadMetadata {
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    #[serde(default)]
    pub total_chunks: u64,
}

impl Default for DownloadMetadata {
    fn default() -> Self {
        Self {
            sha256: None,
            file_size: 0,
            chunk_size: DEFAULT_DOWNLOAD_CHUNK_SIZE,
            total_chunks: 0,
        }
    }
}

fn default_chunk_size() -> u64 {
    DEFAULT_DOWNLOAD_CHUNK_SIZE
}

/// Plain-text acknowledgment exchanged during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Ready,
    Stop,
}

impl Ack {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            ACK_READY => Some(Ack::Ready),
            ACK_STOP => Some(Ack::Stop),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Ack::Ready => ACK_READY,
            Ack::Stop => ACK_STOP,
        }
    }
}

// ---------------------------------------------------------------------------
// Download payload frames
// ---------------------------------------------------------------------------

/// One encrypted download chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkFrame {
    pub data: ChunkPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub index: u64,
    /// Initialization vector, carried by index 0 only.
    #[serde(default, with = "base64_opt", skip_serializing_if = "Option::is_none")]
    pub iv: Option<Vec<u8>>,
    /// Per-chunk digest sent by the server. Carried for compatibility, never checked.
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(with = "base64_bytes")]
    pub chunk: Vec<u8>,
}

/// Decryption key, delivered after the last chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFrame {
    pub data: KeyPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPayload {
    #[serde(with = "base64_bytes")]
    pub key: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

mod base64_opt {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match data {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => STANDARD
                .decode(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_request_wire_format() {
        let frame = ActionFrame::new(
            Action::UploadFile,
            TaskRef {
                task_id: "t-9".into(),
            },
        );
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"action": "upload_file", "data": {"task_id": "t-9"}})
        );
    }

    #[test]
    fn upload_metadata_empty_file_sends_null_hash() {
        let frame = ActionFrame::new(
            Action::TransferFile,
            UploadMetadata {
                sha256: None,
                file_size: 0,
            },
        );
        let json = serde_json::to_value(&frame).unwrap();
        assert!(json["data"]["sha256"].is_null());
        assert_eq!(json["data"]["file_size"], 0);
    }

    #[test]
    fn reply_without_data_parses() {
        let frame: ActionFrame<serde_json::Value> =
            serde_json::from_str(r#"{"action": "transfer_file"}"#).unwrap();
        assert_eq!(frame.action, Action::TransferFile);
        assert!(frame.data.is_null());
    }

    #[test]
    fn download_metadata_defaults_chunk_size() {
        let meta: DownloadMetadata =
            serde_json::from_str(r#"{"sha256": null, "file_size": 10, "total_chunks": 1}"#).unwrap();
        assert_eq!(meta.chunk_size, DEFAULT_DOWNLOAD_CHUNK_SIZE);
        assert_eq!(meta.file_size, 10);
        assert!(meta.sha256.is_none());
    }

    #[test]
    fn ack_parse() {
        assert_eq!(Ack::parse("ready"), Some(Ack::Ready));
        assert_eq!(Ack::parse("stop"), Some(Ack::Stop));
        assert_eq!(Ack::parse("READY"), None);
        assert_eq!(Ack::Ready.as_str(), "ready");
    }

    #[test]
    fn chunk_frame_decodes_base64() {
        let json = r#"{"data": {"index": 0, "iv": "AAECAw==", "hash": "abc", "chunk": "aGVsbG8="}}"#;
        let frame: ChunkFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.data.index, 0);
        assert_eq!(frame.data.iv.as_deref(), Some(&[0u8, 1, 2, 3][..]));
        assert_eq!(frame.data.hash.as_deref(), Some("abc"));
        assert_eq!(frame.data.chunk, b"hello");
    }

    #[test]
    fn chunk_frame_without_iv() {
        let json = r#"{"data": {"index": 3, "iv": null, "hash": "abc", "chunk": ""}}"#;
        let frame: ChunkFrame = serde_json::from_str(json).unwrap();
        assert!(frame.data.iv.is_none());
        assert!(frame.data.chunk.is_empty());
    }

    #[test]
    fn chunk_frame_rejects_bad_base64() {
        let json = r#"{"data": {"index": 1, "hash": "abc", "chunk": "***"}}"#;
        assert!(serde_json::from_str::<ChunkFrame>(json).is_err());
    }

    #[test]
    fn key_frame_roundtrip() {
        let frame = KeyFrame {
            data: KeyPayload { key: vec![7u8; 32] },
        };
        let json = serde_json::to_string(&frame).unwrap();
        let parsed: KeyFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.data.key.len(), 32);
    }
}
