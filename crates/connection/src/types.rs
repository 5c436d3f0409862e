//! Public types for establishing connections.

use std::path::PathBuf;
use std::time::Duration;

use cfms_protocol::constants::TRANSFER_MAX_MESSAGE_SIZE;

/// Default timeout for the TCP, TLS and WebSocket handshakes together.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How a connection is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Verify the server certificate on `wss://` connections.
    ///
    /// When disabled any certificate is accepted.
    pub enforce_tls: bool,
    /// Extra PEM certificate bundle trusted alongside the web PKI roots.
    pub ca_file: Option<PathBuf>,
    /// Largest accepted message; `None` keeps the WebSocket default.
    pub max_message_size: Option<usize>,
    pub connect_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            enforce_tls: true,
            ca_file: None,
            max_message_size: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ConnectOptions {
    /// Options for a dedicated transfer connection: same TLS settings, capped message size.
    pub fn for_transfer(&self) -> Self {
        Self {
            max_message_size: Some(TRANSFER_MAX_MESSAGE_SIZE),
            ..self.clone()
        }
    }
}
