use tokio::sync::{Mutex, MutexGuard};

use cfms_protocol::{FrameChannel, TransportError};

/// Serializes request/response exchanges on a shared control connection.
///
/// Holders of [`lock`](Self::lock) send exactly one request and read exactly
/// one reply before releasing. Bulk transfers never go through a guard; they
/// run on their own dedicated connection.
pub struct ConnectionGuard<C> {
    inner: Mutex<C>,
}

impl<C: FrameChannel> ConnectionGuard<C> {
    pub fn new(connection: C) -> Self {
        Self {
            inner: Mutex::new(connection),
        }
    }

    /// Waits for exclusive access to the connection.
    pub async fn lock(&self) -> MutexGuard<'_, C> {
        self.inner.lock().await
    }

    /// Closes the connection once no exchange is in flight.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.inner.lock().await.close().await
    }

    /// Unwraps the connection.
    pub fn into_inner(self) -> C {
        self.inner.into_inner()
    }
}
