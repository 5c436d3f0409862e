//! Scripted transfer servers for tests.
//!
//! Each `serve_*` function plays the server side of one pipeline over a
//! [`MemoryChannel`]. A peer that disconnects early ends the script
//! normally so tests can inspect what was exchanged up to that point.

use cfms_protocol::constants::{Action, UPLOAD_CHUNK_SIZE};
use cfms_protocol::{
    Ack, ActionFrame, ChunkFrame, ChunkPayload, DownloadMetadata, Frame, FrameChannel, KeyFrame,
    KeyPayload, MemoryChannel, TaskRef, TransportError, UploadMetadata,
};

use crate::frames::{recv_json, send_json, send_text};
use crate::{ChunkEncryptor, TransferError, checksum_bytes};

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Server behavior for [`serve_upload`].
#[derive(Debug, Clone)]
pub struct UploadScript {
    /// Action of the reply to `upload_file`.
    pub reply_action: Action,
    /// Answer to the size/digest announcement.
    pub ack: Ack,
}

impl Default for UploadScript {
    fn default() -> Self {
        Self {
            reply_action: Action::TransferFile,
            ack: Ack::Ready,
        }
    }
}

/// What the upload server observed.
#[derive(Debug, Default)]
pub struct UploadCapture {
    pub task_id: String,
    pub announced: UploadMetadata,
    pub frames: Vec<Vec<u8>>,
}

impl UploadCapture {
    /// All received chunk bytes, concatenated.
    pub fn bytes(&self) -> Vec<u8> {
        self.frames.concat()
    }
}

/// Plays the upload server until a short chunk arrives or the client hangs up.
pub async fn serve_upload(
    mut server: MemoryChannel,
    script: UploadScript,
) -> Result<UploadCapture, TransferError> {
    let mut capture = UploadCapture::default();

    let request: ActionFrame<TaskRef> = match until_closed(recv_json(&mut server).await)? {
        Some(r) => r,
        None => return Ok(capture),
    };
    capture.task_id = request.data.task_id;

    send_json(
        &mut server,
        &ActionFrame::new(script.reply_action, serde_json::json!({})),
    )
    .await?;

    let announce: ActionFrame<UploadMetadata> =
        match until_closed(recv_json(&mut server).await)? {
            Some(a) => a,
            None => return Ok(capture),
        };
    capture.announced = announce.data;

    send_text(&mut server, script.ack.as_str()).await?;
    if script.ack == Ack::Stop || capture.announced.file_size == 0 {
        return Ok(capture);
    }

    loop {
        match server.recv().await {
            Ok(frame) => {
                let data = match frame {
                    Frame::Binary(data) => data,
                    Frame::Text(text) => text.into_bytes(),
                };
                let last = data.len() < UPLOAD_CHUNK_SIZE;
                capture.frames.push(data);
                if last {
                    return Ok(capture);
                }
            }
            Err(TransportError::Closed) => return Ok(capture),
            Err(e) => return Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

pub const FIXTURE_KEY: [u8; 32] = [0x42; 32];
pub const FIXTURE_IV: [u8; 16] = [0x24; 16];

/// Server behavior for [`serve_download`].
///
/// [`DownloadFixture::new`] produces an honest server; tests adjust the
/// public fields to inject faults.
#[derive(Debug, Clone)]
pub struct DownloadFixture {
    pub content: Vec<u8>,
    pub chunk_size: usize,
    /// Announced `file_size`.
    pub file_size: u64,
    /// Announced digest.
    pub sha256: Option<String>,
    pub reply_action: Action,
    /// Order in which chunk indices are sent.
    pub order: Vec<u64>,
    /// Flip one ciphertext byte of this chunk after hashing it.
    pub tamper_chunk: Option<u64>,
    /// Send an empty frame in place of this chunk.
    pub empty_chunk: Option<u64>,
    /// Omit the IV from chunk 0.
    pub omit_iv: bool,
}

impl DownloadFixture {
    pub fn new(content: impl Into<Vec<u8>>, chunk_size: usize) -> Self {
        let content = content.into();
        let total = content.len().div_ceil(chunk_size) as u64;
        let sha256 = (!content.is_empty()).then(|| checksum_bytes(&content));
        Self {
            file_size: content.len() as u64,
            sha256,
            content,
            chunk_size,
            reply_action: Action::TransferFile,
            order: (0..total).collect(),
            tamper_chunk: None,
            empty_chunk: None,
            omit_iv: false,
        }
    }

    pub fn total_chunks(&self) -> u64 {
        self.content.len().div_ceil(self.chunk_size) as u64
    }

    fn ciphertext_chunks(&self) -> Vec<Vec<u8>> {
        let mut cipher = self.content.clone();
        ChunkEncryptor::new(&FIXTURE_KEY, &FIXTURE_IV).encrypt(&mut cipher);
        cipher.chunks(self.chunk_size).map(<[u8]>::to_vec).collect()
    }
}

/// What the download server observed.
#[derive(Debug, Default)]
pub struct DownloadCapture {
    pub task_id: String,
    /// Whether the client acknowledged the metadata with `ready`.
    pub ready_received: bool,
    pub chunks_sent: u64,
    pub key_sent: bool,
}

/// Plays the download server.
pub async fn serve_download(
    mut server: MemoryChannel,
    fixture: DownloadFixture,
) -> Result<DownloadCapture, TransferError> {
    let mut capture = DownloadCapture::default();

    let request: ActionFrame<TaskRef> = match until_closed(recv_json(&mut server).await)? {
        Some(r) => r,
        None => return Ok(capture),
    };
    capture.task_id = request.data.task_id;

    let meta = DownloadMetadata {
        sha256: fixture.sha256.clone(),
        file_size: fixture.file_size,
        chunk_size: fixture.chunk_size as u64,
        total_chunks: fixture.total_chunks(),
    };
    send_json(
        &mut server,
        &ActionFrame::new(fixture.reply_action, meta),
    )
    .await?;

    match server.recv().await {
        Ok(frame) if frame.clone().into_text().as_deref() == Some(Ack::Ready.as_str()) => {
            capture.ready_received = true;
        }
        Ok(other) => {
            return Err(TransferError::Protocol(format!(
                "expected ready, got {other:?}"
            )));
        }
        Err(TransportError::Closed) => return Ok(capture),
        Err(e) => return Err(e.into()),
    }

    if fixture.file_size == 0 {
        return Ok(capture);
    }

    let chunks = fixture.ciphertext_chunks();
    for &index in &fixture.order {
        if fixture.empty_chunk == Some(index) {
            if ignore_closed(server.send(Frame::Text(String::new())).await)? {
                return Ok(capture);
            }
            continue;
        }

        let mut chunk = chunks[index as usize].clone();
        let hash = checksum_bytes(&chunk);
        if fixture.tamper_chunk == Some(index) {
            chunk[0] ^= 0xff;
        }
        let iv = (index == 0 && !fixture.omit_iv).then(|| FIXTURE_IV.to_vec());
        let frame = ChunkFrame {
            data: ChunkPayload {
                index,
                iv,
                hash: Some(hash),
                chunk,
            },
        };
        let text = serde_json::to_string(&frame)?;
        if ignore_closed(server.send(Frame::Text(text)).await)? {
            return Ok(capture);
        }
        capture.chunks_sent += 1;
    }

    let key = KeyFrame {
        data: KeyPayload {
            key: FIXTURE_KEY.to_vec(),
        },
    };
    let text = serde_json::to_string(&key)?;
    if !ignore_closed(server.send(Frame::Text(text)).await)? {
        capture.key_sent = true;
    }
    Ok(capture)
}

/// Maps a closed peer to `None`.
fn until_closed<T>(result: Result<T, TransferError>) -> Result<Option<T>, TransferError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(TransferError::Transport(TransportError::Closed)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Returns `true` if the peer has gone away.
fn ignore_closed(result: Result<(), TransportError>) -> Result<bool, TransferError> {
    match result {
        Ok(()) => Ok(false),
        Err(TransportError::Closed) => Ok(true),
        Err(e) => Err(e.into()),
    }
}
