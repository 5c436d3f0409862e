//! Public types for the client layer.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy for uploads, with exponential backoff between attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Backoff cap, in milliseconds.
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_delay_ms: 250,
            max_delay_ms: 5_000,
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay after failed attempt `attempt` (1-based), with ±25% jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let ms = self.initial_delay_ms as f64 * self.backoff_factor.powi(exp);
        let capped = ms.min(self.max_delay_ms as f64);
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();
        let jittered = capped + capped * 0.25 * jitter_offset(nanos);
        Duration::from_secs_f64(jittered.max(0.0) / 1000.0)
    }
}

/// Maps sub-second nanoseconds onto `[-1, 1)`.
fn jitter_offset(subsec_nanos: u32) -> f64 {
    (subsec_nanos as f64 / 1_000_000_000.0) * 2.0 - 1.0
}

/// Reply to `server_info`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerInfo {
    pub protocol_version: u32,
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl ServerInfo {
    pub fn display_name(&self) -> &str {
        self.server_name.as_deref().unwrap_or("CFMS Server")
    }
}

/// A sub-folder in a directory listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FolderEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created_time: Option<f64>,
}

/// A document in a directory listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DocumentEntry {
    pub id: String,
    pub title: String,
    /// Content size in bytes; 0 when the document has no content yet.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub last_modified: Option<f64>,
}

/// Reply to `list_directory`. A `None` folder id lists the root.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DirectoryListing {
    #[serde(default)]
    pub folders: Vec<FolderEntry>,
    #[serde(default)]
    pub documents: Vec<DocumentEntry>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// Reply to `get_document_info`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DocumentInfo {
    pub document_id: String,
    pub title: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub created_time: Option<f64>,
    #[serde(default)]
    pub last_modified: Option<f64>,
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Only meaningful when `info_code` is 0.
    #[serde(default)]
    pub access_rules: serde_json::Value,
    #[serde(default)]
    pub info_code: i64,
}

impl DocumentInfo {
    /// Access rules, if the server disclosed them.
    pub fn access_rules(&self) -> Option<&serde_json::Value> {
        (self.info_code == 0).then_some(&self.access_rules)
    }
}

/// The logged-in user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserInfo {
    pub username: String,
    pub token: String,
    pub nickname: Option<String>,
    /// Token expiry as a Unix timestamp.
    pub exp: Option<f64>,
    pub permissions: Vec<String>,
    pub groups: Vec<String>,
}

/// Result of a login attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    LoggedIn(UserInfo),
    /// Credentials were accepted but the password must be changed first.
    PasswordChangeRequired,
}
