//! Request/response codec for control operations.

use serde_json::Value;
use tracing::{debug, trace};

use cfms_protocol::{Action, Frame, FrameChannel, Request, Response};

use crate::{ConnectionGuard, RpcError};

/// Sends one request and returns the server's response.
///
/// The guard is held from the write until the reply has been read. The
/// response code is not interpreted; see [`ensure_success`].
pub async fn send_request<C: FrameChannel>(
    guard: &ConnectionGuard<C>,
    action: Action,
    data: Value,
    username: Option<&str>,
    token: Option<&str>,
) -> Result<Response, RpcError> {
    let request = Request::new(action.as_str(), data, username, token);
    let text = serde_json::to_string(&request).map_err(RpcError::Encode)?;

    let reply = {
        let mut conn = guard.lock().await;
        trace!(%action, "sending request");
        conn.send(Frame::Text(text)).await?;
        conn.recv().await?
    };

    let text = reply
        .into_text()
        .ok_or_else(|| RpcError::MalformedResponse("reply is not valid UTF-8".into()))?;
    let response: Response = serde_json::from_str(&text)
        .map_err(|e| RpcError::MalformedResponse(e.to_string()))?;

    debug!(%action, code = response.code, "request completed");
    Ok(response)
}

/// Turns a non-success response into [`RpcError::RequestFailed`].
pub fn ensure_success(response: Response) -> Result<Response, RpcError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(RpcError::RequestFailed(Box::new(response)))
    }
}
