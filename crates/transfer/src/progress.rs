use tokio::sync::mpsc;

/// Upload progress, emitted after every chunk frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub sent: u64,
    pub total: u64,
}

/// Download progress.
///
/// A successful run emits `Receiving*`, `Decrypting*`, `Cleaning`,
/// `Verifying` in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadProgress {
    /// Estimated bytes received out of `total` bytes.
    Receiving { received: u64, total: u64 },
    /// Emitted before decrypting chunk `decrypted` (1-based) of `total`.
    Decrypting { decrypted: u64, total: u64 },
    Cleaning,
    Verifying,
}

impl DownloadProgress {
    /// Numeric stage: 0 receiving, 1 decrypting, 2 cleaning, 3 verifying.
    pub fn stage(&self) -> u8 {
        match self {
            DownloadProgress::Receiving { .. } => 0,
            DownloadProgress::Decrypting { .. } => 1,
            DownloadProgress::Cleaning => 2,
            DownloadProgress::Verifying => 3,
        }
    }

    /// The `(current, total)` pair for counting stages.
    pub fn counts(&self) -> Option<(u64, u64)> {
        match *self {
            DownloadProgress::Receiving { received, total } => Some((received, total)),
            DownloadProgress::Decrypting { decrypted, total } => Some((decrypted, total)),
            DownloadProgress::Cleaning | DownloadProgress::Verifying => None,
        }
    }
}

/// Delivers a progress event. A dropped receiver is not an error.
pub(crate) async fn emit<T: Send>(tx: &mpsc::Sender<T>, event: T) {
    let _ = tx.send(event).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_ordered() {
        let events = [
            DownloadProgress::Receiving {
                received: 1,
                total: 2,
            },
            DownloadProgress::Decrypting {
                decrypted: 0,
                total: 1,
            },
            DownloadProgress::Cleaning,
            DownloadProgress::Verifying,
        ];
        let stages: Vec<u8> = events.iter().map(DownloadProgress::stage).collect();
        assert_eq!(stages, vec![0, 1, 2, 3]);
        assert_eq!(events[0].counts(), Some((1, 2)));
        assert_eq!(events[2].counts(), None);
    }

    #[tokio::test]
    async fn emit_ignores_closed_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        emit(&tx, UploadProgress { sent: 1, total: 1 }).await;
    }
}
