//! End-to-end exchange against a local WebSocket server.

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use cfms_connection::{ConnectOptions, ConnectionGuard, WsConnection, send_request};
use cfms_protocol::{Action, Frame, FrameChannel, TransportError};

/// Accepts one connection; pings before every reply and echoes binary frames.
async fn spawn_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        while let Some(Ok(msg)) = ws.next().await {
            match msg {
                Message::Text(text) => {
                    let request: Value = serde_json::from_str(text.as_str()).unwrap();
                    ws.send(Message::Ping(b"hb".to_vec().into())).await.unwrap();
                    let reply = json!({
                        "code": 200,
                        "message": "ok",
                        "data": {"action": request["action"], "protocol_version": 3},
                    });
                    ws.send(Message::Text(reply.to_string().into())).await.unwrap();
                }
                Message::Binary(data) => {
                    ws.send(Message::Binary(data)).await.unwrap();
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    format!("ws://{addr}")
}

#[tokio::test]
async fn request_roundtrip_skips_pings() {
    let url = spawn_server().await;
    let conn = WsConnection::connect(&url, &ConnectOptions::default())
        .await
        .unwrap();
    assert_eq!(conn.url(), url);

    let guard = ConnectionGuard::new(conn);
    for action in [Action::ServerInfo, Action::ListDirectory] {
        let response = send_request(&guard, action, json!({}), None, None)
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(response.data["action"], action.as_str());
    }

    guard.close().await.unwrap();
    let mut conn = guard.into_inner();
    assert!(conn.is_closed());
    assert!(matches!(
        conn.recv().await,
        Err(TransportError::Closed)
    ));
}

#[tokio::test]
async fn binary_frames_pass_through() {
    let url = spawn_server().await;
    let mut conn = WsConnection::connect(&url, &ConnectOptions::default().for_transfer())
        .await
        .unwrap();

    conn.send(Frame::Binary(vec![1, 2, 3, 4])).await.unwrap();
    assert_eq!(conn.recv().await.unwrap(), Frame::Binary(vec![1, 2, 3, 4]));

    conn.close().await.unwrap();
    conn.close().await.unwrap();
}

#[tokio::test]
async fn refused_connection_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = WsConnection::connect(&format!("ws://{addr}"), &ConnectOptions::default()).await;
    assert!(result.is_err());
}
