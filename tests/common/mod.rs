#![allow(dead_code)]
//! Shared helpers for connection-manager integration tests: an in-process
//! scripted WebSocket server and polling utilities.

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// A listening WebSocket endpoint the manager can dial. Accepts any number
/// of connections, so reconnect behavior can be scripted.
pub struct MockServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl MockServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock server");
        let addr = listener.local_addr().expect("no local addr");
        Self { listener, addr }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Accept the next client connection and complete the WebSocket
    /// handshake.
    pub async fn accept(&self) -> ServerConn {
        let (stream, _) = timeout(STEP_TIMEOUT, self.listener.accept())
            .await
            .expect("timed out waiting for a client connection")
            .expect("accept failed");
        let ws = accept_async(stream)
            .await
            .expect("WebSocket handshake failed");
        ServerConn { ws }
    }

    /// Assert that no client dials within `window`.
    pub async fn expect_no_connection(&self, window: Duration) {
        if timeout(window, self.listener.accept()).await.is_ok() {
            panic!("unexpected client connection");
        }
    }
}

/// One accepted server-side connection.
pub struct ServerConn {
    ws: WebSocketStream<TcpStream>,
}

impl ServerConn {
    /// Next text frame, parsed as JSON. Skips control frames.
    pub async fn recv_json(&mut self) -> Value {
        loop {
            let frame = timeout(STEP_TIMEOUT, self.ws.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("connection closed while waiting for a frame")
                .expect("WebSocket error while waiting for a frame");
            if let Message::Text(text) = frame {
                return serde_json::from_str(text.as_str()).expect("client sent invalid JSON");
            }
        }
    }

    pub async fn send_text(&mut self, payload: impl Into<String>) {
        self.ws
            .send(Message::Text(payload.into().into()))
            .await
            .expect("failed to send frame");
    }

    /// Close handshake initiated by the server.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }

    /// Wait until the client closes the connection (close frame or EOF).
    pub async fn expect_close(&mut self) {
        loop {
            match timeout(STEP_TIMEOUT, self.ws.next())
                .await
                .expect("timed out waiting for close")
            {
                None | Some(Ok(Message::Close(_))) | Some(Err(_)) => return,
                Some(Ok(_)) => continue,
            }
        }
    }
}

/// Poll `cond` every 10 ms until it holds, panicking after 5 s.
pub async fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + STEP_TIMEOUT;
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not met within {:?}", STEP_TIMEOUT);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
