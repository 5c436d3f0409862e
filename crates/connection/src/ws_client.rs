//! WebSocket connection to a CFMS server.
//!
//! One [`WsConnection`] is one duplex message channel. It has no request
//! correlation of its own: replies are matched to requests by position,
//! which is why control traffic goes through a
//! [`ConnectionGuard`](crate::ConnectionGuard).

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use cfms_protocol::{ChannelFuture, Frame, FrameChannel, TransportError};

use crate::types::ConnectOptions;
use crate::{ConnectionError, tls};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An open WebSocket connection.
pub struct WsConnection {
    stream: WsStream,
    url: String,
    closed: bool,
}

impl WsConnection {
    /// Opens a connection to `url` (`ws://` or `wss://`).
    pub async fn connect(url: &str, options: &ConnectOptions) -> Result<Self, ConnectionError> {
        let secure = if url.starts_with("wss://") {
            true
        } else if url.starts_with("ws://") {
            false
        } else {
            return Err(ConnectionError::InvalidUrl(url.to_string()));
        };

        let mut ws_config = WebSocketConfig::default();
        if let Some(max) = options.max_message_size {
            ws_config.max_message_size = Some(max);
            ws_config.max_frame_size = Some(max);
        }

        let connector = if secure {
            Some(Connector::Rustls(tls::client_config(options)?))
        } else {
            None
        };

        let (stream, _) = tokio::time::timeout(
            options.connect_timeout,
            tokio_tungstenite::connect_async_tls_with_config(
                url,
                Some(ws_config),
                false,
                connector,
            ),
        )
        .await
        .map_err(|_| ConnectionError::Timeout)??;

        debug!(url, secure, "connected");
        Ok(Self {
            stream,
            url: url.to_string(),
            closed: false,
        })
    }

    /// The address this connection was opened with.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

fn map_ws_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            TransportError::Closed
        }
        other => TransportError::other(other),
    }
}

impl FrameChannel for WsConnection {
    fn send(&mut self, frame: Frame) -> ChannelFuture<'_, ()> {
        Box::pin(async move {
            if self.closed {
                return Err(TransportError::Closed);
            }
            let message = match frame {
                Frame::Text(text) => Message::Text(text.into()),
                Frame::Binary(data) => Message::Binary(data.into()),
            };
            self.stream.send(message).await.map_err(map_ws_error)
        })
    }

    fn recv(&mut self) -> ChannelFuture<'_, Frame> {
        Box::pin(async move {
            if self.closed {
                return Err(TransportError::Closed);
            }
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Text(text))) => return Ok(Frame::Text(text.as_str().to_owned())),
                    Some(Ok(Message::Binary(data))) => return Ok(Frame::Binary(data.to_vec())),
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                        trace!(url = %self.url, "skipping control frame");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(url = %self.url, ?frame, "server closed connection");
                        self.closed = true;
                        return Err(TransportError::Closed);
                    }
                    Some(Err(e)) => return Err(map_ws_error(e)),
                    None => {
                        self.closed = true;
                        return Err(TransportError::Closed);
                    }
                }
            }
        })
    }

    fn close(&mut self) -> ChannelFuture<'_, ()> {
        Box::pin(async move {
            if self.closed {
                return Ok(());
            }
            self.closed = true;
            match self.stream.close(None).await {
                Ok(())
                | Err(tungstenite::Error::ConnectionClosed)
                | Err(tungstenite::Error::AlreadyClosed) => {
                    debug!(url = %self.url, "connection closed");
                    Ok(())
                }
                Err(e) => Err(TransportError::other(e)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_websocket_scheme() {
        let result = WsConnection::connect("https://example.com", &ConnectOptions::default()).await;
        assert!(matches!(result, Err(ConnectionError::InvalidUrl(_))));
    }

    #[test]
    fn closed_errors_map_to_closed() {
        assert!(matches!(
            map_ws_error(tungstenite::Error::ConnectionClosed),
            TransportError::Closed
        ));
        assert!(matches!(
            map_ws_error(tungstenite::Error::AlreadyClosed),
            TransportError::Closed
        ));
        assert!(matches!(
            map_ws_error(tungstenite::Error::Io(std::io::Error::other("reset"))),
            TransportError::Other(_)
        ));
    }
}
