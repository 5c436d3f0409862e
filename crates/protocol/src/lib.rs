//! Wire protocol types for the CFMS client.
//!
//! Covers the JSON control envelopes, the upload/download handshake
//! frames, and the [`FrameChannel`] transport seam.

pub mod channel;
pub mod constants;
pub mod envelope;
pub mod transfer;

// Re-export primary types for convenience.
pub use channel::{ChannelFuture, Frame, FrameChannel, MemoryChannel, TransportError, memory_pair};
pub use constants::Action;
pub use envelope::{Request, Response};
pub use transfer::{
    Ack, ActionFrame, ChunkFrame, ChunkPayload, DownloadMetadata, KeyFrame, KeyPayload, TaskRef,
    UploadMetadata,
};
