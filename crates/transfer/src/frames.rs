//! Frame helpers shared by both pipelines.

use cfms_protocol::constants::Action;
use cfms_protocol::{ActionFrame, Frame, FrameChannel};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::TransferError;

pub(crate) async fn send_json<C, T>(channel: &mut C, value: &T) -> Result<(), TransferError>
where
    C: FrameChannel + ?Sized,
    T: Serialize + ?Sized,
{
    let text = serde_json::to_string(value)?;
    channel.send(Frame::Text(text)).await?;
    Ok(())
}

pub(crate) async fn send_text<C>(channel: &mut C, text: &str) -> Result<(), TransferError>
where
    C: FrameChannel + ?Sized,
{
    channel.send(Frame::Text(text.to_string())).await?;
    Ok(())
}

/// Reads one non-empty text frame.
pub(crate) async fn recv_text<C>(channel: &mut C) -> Result<String, TransferError>
where
    C: FrameChannel + ?Sized,
{
    let frame = channel.recv().await?;
    if frame.is_empty() {
        return Err(TransferError::Protocol("empty frame".into()));
    }
    frame
        .into_text()
        .ok_or_else(|| TransferError::Protocol("frame is not valid UTF-8".into()))
}

/// Reads one frame and decodes it as JSON. Undecodable frames are protocol violations.
pub(crate) async fn recv_json<C, T>(channel: &mut C) -> Result<T, TransferError>
where
    C: FrameChannel + ?Sized,
    T: DeserializeOwned,
{
    let text = recv_text(channel).await?;
    serde_json::from_str(&text).map_err(|e| TransferError::Protocol(format!("malformed frame: {e}")))
}

/// Reads the server's reply to a task request and requires `transfer_file`.
pub(crate) async fn recv_transfer_reply<C, T>(channel: &mut C) -> Result<T, TransferError>
where
    C: FrameChannel + ?Sized,
    T: DeserializeOwned + Default,
{
    let value: Value = recv_json(channel).await?;
    match value.get("action").and_then(Value::as_str) {
        Some(action) if action == Action::TransferFile.as_str() => {}
        Some(action) => {
            return Err(TransferError::Protocol(format!(
                "expected action transfer_file, got {action:?}"
            )));
        }
        None => {
            return Err(TransferError::Protocol(
                "expected action transfer_file, got none".into(),
            ));
        }
    }
    let reply: ActionFrame<T> = serde_json::from_value(value)
        .map_err(|e| TransferError::Protocol(format!("malformed frame: {e}")))?;
    Ok(reply.data)
}
