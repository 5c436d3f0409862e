//! Message-channel seam shared by the control plane and transfer pipelines.
//!
//! A [`FrameChannel`] is one duplex, message-oriented connection. The
//! WebSocket client implements it for real servers; [`memory_pair`] gives an
//! in-process loopback used to drive scripted peers.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

/// Boxed future returned by [`FrameChannel`] methods.
pub type ChannelFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// One message on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    /// Returns the frame as text. Binary frames are accepted if valid UTF-8.
    pub fn into_text(self) -> Option<String> {
        match self {
            Frame::Text(text) => Some(text),
            Frame::Binary(bytes) => String::from_utf8(bytes).ok(),
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Connection-level failure.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("transport error: {0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        TransportError::Other(Box::new(err))
    }
}

/// A duplex message channel owned by exactly one user at a time.
pub trait FrameChannel: Send {
    /// Writes one frame.
    fn send(&mut self, frame: Frame) -> ChannelFuture<'_, ()>;

    /// Reads the next data frame. Control traffic (pings) is handled internally.
    fn recv(&mut self) -> ChannelFuture<'_, Frame>;

    /// Closes the channel. Closing twice is not an error.
    fn close(&mut self) -> ChannelFuture<'_, ()>;
}

impl<C: FrameChannel + ?Sized> FrameChannel for Box<C> {
    fn send(&mut self, frame: Frame) -> ChannelFuture<'_, ()> {
        (**self).send(frame)
    }

    fn recv(&mut self) -> ChannelFuture<'_, Frame> {
        (**self).recv()
    }

    fn close(&mut self) -> ChannelFuture<'_, ()> {
        (**self).close()
    }
}

// ---------------------------------------------------------------------------
// In-memory loopback
// ---------------------------------------------------------------------------

/// One end of an in-process channel created by [`memory_pair`].
pub struct MemoryChannel {
    tx: Option<mpsc::Sender<Frame>>,
    rx: mpsc::Receiver<Frame>,
}

/// Creates two connected channel ends with the given per-direction buffer.
pub fn memory_pair(buffer: usize) -> (MemoryChannel, MemoryChannel) {
    let (a_tx, b_rx) = mpsc::channel(buffer);
    let (b_tx, a_rx) = mpsc::channel(buffer);
    (
        MemoryChannel {
            tx: Some(a_tx),
            rx: a_rx,
        },
        MemoryChannel {
            tx: Some(b_tx),
            rx: b_rx,
        },
    )
}

impl FrameChannel for MemoryChannel {
    fn send(&mut self, frame: Frame) -> ChannelFuture<'_, ()> {
        Box::pin(async move {
            let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
            tx.send(frame).await.map_err(|_| TransportError::Closed)
        })
    }

    fn recv(&mut self) -> ChannelFuture<'_, Frame> {
        Box::pin(async move { self.rx.recv().await.ok_or(TransportError::Closed) })
    }

    fn close(&mut self) -> ChannelFuture<'_, ()> {
        Box::pin(async move {
            self.tx = None;
            self.rx.close();
            Ok(())
        })
    }
}
