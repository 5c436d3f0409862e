//! Transfer orchestration on dedicated connections.
//!
//! Every transfer opens its own connection through a [`Connector`], runs one
//! pipeline on it, and closes it directly. The shared control connection is
//! never used for bulk data.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cfms_connection::{ConnectOptions, ConnectionError, WsConnection};
use cfms_protocol::FrameChannel;
use cfms_transfer::{
    DownloadProgress, DownloadReport, TransferError, TransferTask, UploadProgress, UploadReport,
    download_file, upload_file,
};

use crate::config::ClientConfig;
use crate::session::Session;
use crate::types::RetryConfig;
use crate::ClientError;

/// Boxed future returned by [`Connector::connect`].
pub type ConnectFuture<'a, C> = Pin<Box<dyn Future<Output = Result<C, ConnectionError>> + Send + 'a>>;

/// Opens dedicated transfer connections.
pub trait Connector: Send + Sync {
    type Conn: FrameChannel + 'static;

    fn connect(&self) -> ConnectFuture<'_, Self::Conn>;
}

/// Connects to a server over WebSocket.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    options: ConnectOptions,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, options: ConnectOptions) -> Self {
        Self {
            url: url.into(),
            options,
        }
    }
}

impl Connector for WsConnector {
    type Conn = WsConnection;

    fn connect(&self) -> ConnectFuture<'_, WsConnection> {
        Box::pin(WsConnection::connect(&self.url, &self.options))
    }
}

/// Runs uploads and downloads, each on a fresh connection.
pub struct TransferService<K> {
    connector: K,
    temp_root: PathBuf,
    retry: RetryConfig,
}

impl TransferService<WsConnector> {
    /// Builds a service for the configured server.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            WsConnector::new(config.server_address.clone(), config.transfer_options()),
            config.temp_root.clone(),
            config.upload_retry.clone(),
        )
    }
}

impl<K: Connector> TransferService<K> {
    pub fn new(connector: K, temp_root: impl Into<PathBuf>, retry: RetryConfig) -> Self {
        Self {
            connector,
            temp_root: temp_root.into(),
            retry,
        }
    }

    /// Uploads a file, retrying transport failures on a new connection.
    ///
    /// Protocol violations and cancellation end the upload immediately.
    pub async fn upload(
        &self,
        task: &TransferTask,
        progress_tx: &mpsc::Sender<UploadProgress>,
        cancel: &CancellationToken,
    ) -> Result<UploadReport, ClientError> {
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.upload_once(task, progress_tx, cancel).await {
                Ok(report) => return Ok(report),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        task_id = %task.task_id,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "upload attempt failed, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(TransferError::Cancelled.into()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => {
                    warn!(task_id = %task.task_id, attempt, error = %e, "upload failed");
                    return Err(e);
                }
            }
        }
    }

    async fn upload_once(
        &self,
        task: &TransferTask,
        progress_tx: &mpsc::Sender<UploadProgress>,
        cancel: &CancellationToken,
    ) -> Result<UploadReport, ClientError> {
        let mut conn = self.connector.connect().await?;
        let result = upload_file(&mut conn, task, progress_tx, cancel).await;
        close_dedicated(&mut conn).await;
        Ok(result?)
    }

    /// Downloads a file into `task.file_path`.
    pub async fn download(
        &self,
        task: &TransferTask,
        progress_tx: &mpsc::Sender<DownloadProgress>,
        cancel: &CancellationToken,
    ) -> Result<DownloadReport, ClientError> {
        let mut conn = self.connector.connect().await?;
        let result = download_file(&mut conn, task, &self.temp_root, progress_tx, cancel).await;
        close_dedicated(&mut conn).await;
        Ok(result?)
    }

    /// Creates a document named after the file and uploads its content.
    pub async fn upload_document<C: FrameChannel>(
        &self,
        session: &Session<C>,
        path: &Path,
        folder_id: Option<&str>,
        progress_tx: &mpsc::Sender<UploadProgress>,
        cancel: &CancellationToken,
    ) -> Result<UploadReport, ClientError> {
        let title = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                TransferError::InvalidTask(format!("{} has no file name", path.display()))
            })?;

        let task_id = session.create_document(&title, folder_id).await?;
        info!(%task_id, %title, "uploading document");
        self.upload(&TransferTask::upload(task_id, path), progress_tx, cancel)
            .await
    }

    /// Downloads a document's content to `dest`.
    pub async fn download_document<C: FrameChannel>(
        &self,
        session: &Session<C>,
        document_id: &str,
        dest: &Path,
        progress_tx: &mpsc::Sender<DownloadProgress>,
        cancel: &CancellationToken,
    ) -> Result<DownloadReport, ClientError> {
        let task_id = session.get_document(document_id).await?;
        info!(%task_id, document_id, dest = %dest.display(), "downloading document");
        self.download(&TransferTask::download(task_id, dest), progress_tx, cancel)
            .await
    }
}

async fn close_dedicated<C: FrameChannel>(conn: &mut C) {
    if let Err(e) = conn.close().await {
        debug!(error = %e, "closing transfer connection");
    }
}
