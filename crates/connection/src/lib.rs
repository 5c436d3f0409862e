//! Connections to a CFMS server.
//!
//! [`WsConnection`] opens `ws://`/`wss://` connections. Control requests
//! share one connection through a [`ConnectionGuard`] and are exchanged with
//! [`send_request`]; bulk transfers open their own connection with
//! [`ConnectOptions::for_transfer`] and close it directly.

mod error;
mod guard;
pub mod rpc;
pub mod tls;
pub mod types;
pub mod ws_client;

pub use error::{ConnectionError, RpcError};
pub use guard::ConnectionGuard;
pub use rpc::{ensure_success, send_request};
pub use types::ConnectOptions;
pub use ws_client::WsConnection;
