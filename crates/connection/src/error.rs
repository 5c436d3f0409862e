use cfms_protocol::{Response, TransportError};
use tokio_tungstenite::tungstenite;

/// Errors raised while opening a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("invalid server address: {0}")]
    InvalidUrl(String),

    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection timed out")]
    Timeout,
}

/// Errors from a control request.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    /// The server answered with a non-success code.
    #[error("request failed with code {}: {}", .0.code, .0.message)]
    RequestFailed(Box<Response>),
}

impl RpcError {
    /// Returns `true` for faults of the connection itself rather than the request.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RpcError::Transport(_) | RpcError::MalformedResponse(_)
        )
    }

    /// The server's response, for request failures.
    pub fn response(&self) -> Option<&Response> {
        match self {
            RpcError::RequestFailed(response) => Some(response),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_failed_display() {
        let response: Response =
            serde_json::from_str(r#"{"code": 404, "message": "no such document", "data": {}}"#)
                .unwrap();
        let err = RpcError::RequestFailed(Box::new(response));
        assert_eq!(
            err.to_string(),
            "request failed with code 404: no such document"
        );
        assert_eq!(err.response().map(|r| r.code), Some(404));
        assert!(!err.is_transport());
    }

    #[test]
    fn transport_classification() {
        assert!(RpcError::Transport(TransportError::Closed).is_transport());
        assert!(RpcError::MalformedResponse("eof".into()).is_transport());
    }

    #[test]
    fn connection_error_display() {
        assert_eq!(ConnectionError::Timeout.to_string(), "connection timed out");
        assert_eq!(
            ConnectionError::InvalidUrl("ftp://x".into()).to_string(),
            "invalid server address: ftp://x"
        );
    }
}
