//! CFMS client: configuration, the authenticated control session, and
//! upload/download orchestration on dedicated connections.

pub mod config;
mod error;
pub mod session;
pub mod transfer;
pub mod types;

pub use config::{ClientConfig, config_path};
pub use error::ClientError;
pub use session::Session;
pub use transfer::{ConnectFuture, Connector, TransferService, WsConnector};
pub use types::{
    DirectoryListing, DocumentEntry, DocumentInfo, FolderEntry, LoginOutcome, RetryConfig,
    ServerInfo, UserInfo,
};
