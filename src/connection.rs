//! Connection manager: owns the single WebSocket, classifies inbound frames,
//! tracks subscription identity, and reconnects with exponential backoff
//! after unexpected disconnects.
//!
//! The public [`ConnectionManager`] handle sends commands to a background
//! task that exclusively owns the socket and the reconnect timer. All state
//! transitions are serialized through that task; observers read status
//! snapshots and the event log, or register [`EventHandlers`] callbacks.

use crate::error::{PubsubLinkError, Result};
use crate::event_handlers::{ConnectionError, DisconnectReason, EventHandlers};
use crate::event_log::EventLog;
use crate::message::{classify, Classified, ReplyResult};
use crate::models::{
    ConnectionStatus, EventKind, JsonRpcRequest, SubscriptionId, SubscriptionStatus,
};
use crate::options::ConnectionOptions;
use crate::request::{build_unsubscribe_request, SubscribeRequest};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant as TokioInstant;
use tokio_tungstenite::tungstenite::error::Error as WsError;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Commands sent from the public API to the background connection task.
enum Cmd {
    /// Tear down any current socket, record the request for replay, and dial.
    Connect {
        url: String,
        request: SubscribeRequest,
    },
    /// Unsubscribe (best-effort), close intentionally, and suppress reconnect.
    Disconnect,
    /// Stop the background task entirely.
    Shutdown,
}

/// Snapshots shared between the task (sole writer) and observers.
struct SharedState {
    connection_status: RwLock<ConnectionStatus>,
    subscription_status: RwLock<SubscriptionStatus>,
    subscription_id: RwLock<Option<SubscriptionId>>,
    sent_request: RwLock<Option<JsonRpcRequest>>,
    reconnect_attempts: AtomicU32,
}

impl SharedState {
    fn new() -> Self {
        Self {
            connection_status: RwLock::new(ConnectionStatus::Disconnected),
            subscription_status: RwLock::new(SubscriptionStatus::Idle),
            subscription_id: RwLock::new(None),
            sent_request: RwLock::new(None),
            reconnect_attempts: AtomicU32::new(0),
        }
    }

    fn set_connection_status(&self, status: ConnectionStatus) {
        *self
            .connection_status
            .write()
            .unwrap_or_else(|e| e.into_inner()) = status;
    }

    /// Update the subscription status. The handle is valid only while
    /// `Active`, so any other status clears it.
    fn set_subscription_status(&self, status: SubscriptionStatus) {
        if status != SubscriptionStatus::Active {
            *self
                .subscription_id
                .write()
                .unwrap_or_else(|e| e.into_inner()) = None;
        }
        *self
            .subscription_status
            .write()
            .unwrap_or_else(|e| e.into_inner()) = status;
    }

    fn set_subscription_id(&self, id: Option<SubscriptionId>) {
        *self
            .subscription_id
            .write()
            .unwrap_or_else(|e| e.into_inner()) = id;
    }

    fn current_subscription_id(&self) -> Option<SubscriptionId> {
        self.subscription_id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Validate the caller-supplied endpoint URL before dialing.
fn resolve_ws_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw.trim()).map_err(|e| {
        PubsubLinkError::ConfigurationError(format!("Invalid endpoint URL '{}': {}", raw, e))
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url.to_string()),
        other => Err(PubsubLinkError::ConfigurationError(format!(
            "Unsupported URL scheme '{}': expected ws or wss",
            other
        ))),
    }
}

/// Manager for one logical subscription over one WebSocket at a time.
///
/// # Examples
///
/// ```rust,no_run
/// use pubsub_link::{build_request, ConnectionManager, SubscribeParams};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = ConnectionManager::new();
/// let request = build_request(&SubscribeParams::Slot, 1)?;
/// manager.connect("wss://api.mainnet-beta.solana.com", request).await?;
///
/// // ... observe manager.recent_events() / statuses ...
///
/// manager.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager {
    cmd_tx: mpsc::Sender<Cmd>,
    state: Arc<SharedState>,
    log: EventLog,
    _task: JoinHandle<()>,
}

impl ConnectionManager {
    /// Create a manager with default options and no callbacks. Must be
    /// called within a tokio runtime.
    pub fn new() -> Self {
        Self::with_options(ConnectionOptions::default(), EventHandlers::default())
    }

    /// Create a manager with explicit options and lifecycle callbacks.
    pub fn with_options(options: ConnectionOptions, handlers: EventHandlers) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Cmd>(256);
        let state = Arc::new(SharedState::new());
        let log = EventLog::new();

        let task = tokio::spawn(connection_task(
            cmd_rx,
            ConnectionTask {
                state: state.clone(),
                log: log.clone(),
                handlers,
                options,
                ws: None,
                pending: None,
                reconnect_at: None,
                subscribe_req_id: None,
                next_request_id: 1,
            },
        ));

        Self {
            cmd_tx,
            state,
            log,
            _task: task,
        }
    }

    /// Open a connection to `url` and send the subscribe request. Any
    /// previous socket or scheduled reconnect is torn down first. The
    /// request is retained and replayed verbatim after automatic reconnects.
    pub async fn connect(&self, url: impl Into<String>, request: SubscribeRequest) -> Result<()> {
        let url = resolve_ws_url(&url.into())?;
        self.cmd_tx
            .send(Cmd::Connect { url, request })
            .await
            .map_err(|_| PubsubLinkError::ChannelClosed)
    }

    /// Unsubscribe (best-effort, if a subscription is active) and close the
    /// connection. Cancels any scheduled reconnect; no reconnect will occur
    /// afterward. The manager stays usable for a later `connect`.
    pub async fn disconnect(&self) -> Result<()> {
        self.cmd_tx
            .send(Cmd::Disconnect)
            .await
            .map_err(|_| PubsubLinkError::ChannelClosed)
    }

    /// Empty the event log. Idempotent.
    pub fn clear_log(&self) {
        self.log.clear();
    }

    /// Current transport state.
    pub fn connection_status(&self) -> ConnectionStatus {
        *self
            .state
            .connection_status
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Current subscription lifecycle state.
    pub fn subscription_status(&self) -> SubscriptionStatus {
        *self
            .state
            .subscription_status
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Server-assigned subscription id, while the subscription is active.
    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        self.state.current_subscription_id()
    }

    /// The last subscribe envelope handed to `connect`, for preview and
    /// debugging.
    pub fn sent_request(&self) -> Option<JsonRpcRequest> {
        self.state
            .sent_request
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Every log entry, in append order.
    pub fn events(&self) -> Vec<crate::models::LogEvent> {
        self.log.snapshot()
    }

    /// The most recent log entries, bounded for display.
    pub fn recent_events(&self) -> Vec<crate::models::LogEvent> {
        self.log.recent()
    }

    /// Number of reconnects scheduled since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.state.reconnect_attempts.load(Ordering::SeqCst)
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        // Best-effort shutdown signal.
        let _ = self.cmd_tx.try_send(Cmd::Shutdown);
    }
}

// ── Background connection task ──────────────────────────────────────────────

/// The subscribe request recorded for replay-on-reconnect, together with the
/// endpoint it was sent to.
#[derive(Clone)]
struct Pending {
    url: String,
    request: SubscribeRequest,
}

/// State owned exclusively by the background task. The socket and the
/// reconnect deadline live here as swappable slots; every replacement first
/// releases the previous resource.
struct ConnectionTask {
    state: Arc<SharedState>,
    log: EventLog,
    handlers: EventHandlers,
    options: ConnectionOptions,
    ws: Option<WsStream>,
    pending: Option<Pending>,
    reconnect_at: Option<TokioInstant>,
    /// Request id of the outstanding subscribe call, used to correlate the
    /// acknowledgement reply.
    subscribe_req_id: Option<u64>,
    /// Counter for locally generated envelopes (the unsubscribe request).
    next_request_id: u64,
}

/// Await the next frame, or park forever when no socket is installed (the
/// caller only selects on this branch while connected).
async fn next_frame(ws: &mut Option<WsStream>) -> Option<std::result::Result<Message, WsError>> {
    match ws.as_mut() {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

/// Event loop. Reacts to one trigger at a time: a caller command, a socket
/// frame, or the reconnect timer firing.
async fn connection_task(mut cmd_rx: mpsc::Receiver<Cmd>, mut task: ConnectionTask) {
    loop {
        if task.ws.is_some() {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    if task.handle_cmd(cmd).await {
                        return;
                    }
                }
                frame = next_frame(&mut task.ws) => {
                    task.handle_frame(frame).await;
                }
            }
        } else if let Some(deadline) = task.reconnect_at {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    if task.handle_cmd(cmd).await {
                        return;
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    task.reconnect_at = None;
                    // Reconnect only while a pending request survives; a
                    // disconnect in the interim cleared it.
                    if task.pending.is_some() {
                        task.establish().await;
                    }
                }
            }
        } else if task.handle_cmd(cmd_rx.recv().await).await {
            return;
        }
    }
}

impl ConnectionTask {
    /// Dispatch one command. Returns `true` when the task should exit.
    async fn handle_cmd(&mut self, cmd: Option<Cmd>) -> bool {
        match cmd {
            Some(Cmd::Connect { url, request }) => {
                self.handle_connect(url, request).await;
                false
            },
            Some(Cmd::Disconnect) => {
                self.handle_disconnect().await;
                false
            },
            Some(Cmd::Shutdown) | None => {
                if let Some(mut stream) = self.ws.take() {
                    let _ = stream.close(None).await;
                }
                true
            },
        }
    }

    /// Install a new pending request and dial. Supersedes any live socket or
    /// scheduled reconnect.
    async fn handle_connect(&mut self, url: String, request: SubscribeRequest) {
        self.reconnect_at = None;
        if let Some(mut old) = self.ws.take() {
            let _ = old.close(None).await;
        }
        self.subscribe_req_id = None;
        self.next_request_id = self.next_request_id.max(request.envelope.id + 1);
        self.state.set_subscription_status(SubscriptionStatus::Idle);
        *self
            .state
            .sent_request
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(request.envelope.clone());
        self.pending = Some(Pending { url, request });
        self.establish().await;
    }

    /// Intentional close: best-effort unsubscribe, suppress reconnect, reset
    /// both statuses. The socket is taken out of its slot before closing so
    /// no stale events are processed afterward.
    async fn handle_disconnect(&mut self) {
        self.reconnect_at = None;
        let method = self.pending.take().map(|p| p.request.method);
        let subscription_id = self.state.current_subscription_id();

        if let Some(mut stream) = self.ws.take() {
            if let (Some(method), Some(sid)) = (method, subscription_id) {
                let unsub = build_unsubscribe_request(method, &sid, self.next_request_id);
                self.next_request_id += 1;
                match unsub.to_wire() {
                    Ok(payload) => {
                        if let Err(e) = stream.send(Message::Text(payload.into())).await {
                            log::warn!("Failed to send unsubscribe: {}", e);
                        }
                    },
                    Err(e) => log::warn!("Failed to serialize unsubscribe: {}", e),
                }
            }
            let _ = stream.close(None).await;
        }

        self.subscribe_req_id = None;
        self.state.set_subscription_status(SubscriptionStatus::Idle);
        self.state.set_connection_status(ConnectionStatus::Disconnected);
        self.log.push(EventKind::Info, "Disconnected", &self.handlers);
        self.handlers
            .emit_disconnect(DisconnectReason::new("Client disconnected"));
    }

    /// Dial the pending endpoint and send the subscribe request. On any
    /// failure, logs, reflects the error in the connection status, and
    /// schedules a reconnect.
    async fn establish(&mut self) {
        let Some(pending) = self.pending.clone() else {
            return;
        };

        self.state.set_connection_status(ConnectionStatus::Connecting);
        log::debug!("Establishing WebSocket connection to {}", pending.url);

        let dial = connect_async(pending.url.as_str());
        let connected = match self.options.connect_timeout {
            Some(limit) => match tokio::time::timeout(limit, dial).await {
                Ok(result) => result.map_err(|e| format!("Connection failed: {}", e)),
                Err(_) => Err(format!("Connection timeout ({:?})", limit)),
            },
            None => dial.await.map_err(|e| format!("Connection failed: {}", e)),
        };

        let stream = match connected {
            Ok((stream, _response)) => stream,
            Err(message) => {
                log::warn!("{}", message);
                self.log
                    .push(EventKind::Error, message.clone(), &self.handlers);
                self.handlers
                    .emit_error(ConnectionError::new(message, true));
                self.state.set_connection_status(ConnectionStatus::Error);
                self.schedule_reconnect();
                return;
            },
        };

        self.ws = Some(stream);
        self.state.set_connection_status(ConnectionStatus::Connected);
        self.state.reconnect_attempts.store(0, Ordering::SeqCst);
        self.log.push(EventKind::Info, "Connected", &self.handlers);
        self.handlers.emit_connect();

        self.state
            .set_subscription_status(SubscriptionStatus::Subscribing);
        self.subscribe_req_id = Some(pending.request.envelope.id);
        if let Err(e) = self.send_envelope(&pending.request.envelope).await {
            let message = e.to_string();
            self.log
                .push(EventKind::Error, message.clone(), &self.handlers);
            self.handlers
                .emit_error(ConnectionError::new(message, true));
            self.state.set_connection_status(ConnectionStatus::Error);
            self.state.set_subscription_status(SubscriptionStatus::Idle);
            self.ws = None;
            self.schedule_reconnect();
        }
    }

    /// Serialize and send one envelope, logging it as `sent` on success.
    async fn send_envelope(&mut self, envelope: &JsonRpcRequest) -> Result<()> {
        let payload = envelope.to_wire()?;
        let Some(ws) = self.ws.as_mut() else {
            return Err(PubsubLinkError::WebSocketError(
                "Socket is not open".to_string(),
            ));
        };
        ws.send(Message::Text(payload.clone().into()))
            .await
            .map_err(|e| {
                PubsubLinkError::WebSocketError(format!("Failed to send request: {}", e))
            })?;
        self.log.push(EventKind::Sent, payload, &self.handlers);
        Ok(())
    }

    /// Arm the backoff timer: `min(base * 2^attempt, cap)`, incrementing the
    /// attempt counter.
    fn schedule_reconnect(&mut self) {
        let attempt = self.state.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
        let delay = self.options.reconnect_delay(attempt);
        log::info!(
            "Attempting reconnection in {}ms (attempt {})",
            delay.as_millis(),
            attempt + 1
        );
        self.log.push(
            EventKind::Info,
            format!("Reconnecting in {}ms (attempt {})", delay.as_millis(), attempt + 1),
            &self.handlers,
        );
        self.reconnect_at = Some(TokioInstant::now() + delay);
    }

    async fn handle_frame(&mut self, frame: Option<std::result::Result<Message, WsError>>) {
        match frame {
            Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()),
            Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                Ok(text) => self.handle_text(text),
                Err(_) => {
                    self.log.push(
                        EventKind::Received,
                        String::from_utf8_lossy(&data).into_owned(),
                        &self.handlers,
                    );
                },
            },
            Some(Ok(Message::Ping(payload))) => {
                if let Some(ws) = self.ws.as_mut() {
                    let _ = ws.send(Message::Pong(payload)).await;
                }
            },
            Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {},
            Some(Ok(Message::Close(close))) => {
                let (message, reason) = match close {
                    Some(frame) => {
                        let code = u16::from(frame.code);
                        (
                            format!("Connection closed (code: {})", code),
                            DisconnectReason::with_code("Server closed connection", code),
                        )
                    },
                    None => (
                        "Connection closed".to_string(),
                        DisconnectReason::new("Server closed connection"),
                    ),
                };
                self.log.push(EventKind::Info, message, &self.handlers);
                self.handlers.emit_disconnect(reason);
                self.state
                    .set_connection_status(ConnectionStatus::Disconnected);
                self.on_unexpected_close();
            },
            Some(Err(e)) => {
                let message = format!("WebSocket error: {}", e);
                self.log
                    .push(EventKind::Error, message.clone(), &self.handlers);
                self.handlers
                    .emit_error(ConnectionError::new(message.clone(), true));
                // Transport error: the status reflects the fault, but the
                // reconnect loop continues.
                self.state.set_connection_status(ConnectionStatus::Error);
                self.handlers.emit_disconnect(DisconnectReason::new(message));
                self.on_unexpected_close();
            },
            None => {
                self.log
                    .push(EventKind::Info, "Connection closed", &self.handlers);
                self.handlers
                    .emit_disconnect(DisconnectReason::new("WebSocket stream ended"));
                self.state
                    .set_connection_status(ConnectionStatus::Disconnected);
                self.on_unexpected_close();
            },
        }
    }

    /// Release the dead socket and arm the backoff timer. The pending
    /// request is kept so the timer can replay it.
    fn on_unexpected_close(&mut self) {
        self.ws = None;
        self.subscribe_req_id = None;
        self.state.set_subscription_status(SubscriptionStatus::Idle);
        self.schedule_reconnect();
    }

    /// Classify one inbound text frame and apply the matching transition.
    fn handle_text(&mut self, text: &str) {
        match classify(text) {
            Classified::ProxySubscribed(sid) => self.on_subscribe_ack(sid),
            Classified::ProxyUnsubscribed => self.on_unsubscribe_ack(),
            Classified::ProxyError(message) => self.on_protocol_error(message),
            Classified::ReplyResult { id, result } => match result {
                ReplyResult::SubscriptionId(sid) if self.subscribe_req_id == Some(id) => {
                    self.on_subscribe_ack(sid)
                },
                ReplyResult::Bool(true) => self.on_unsubscribe_ack(),
                _ => self
                    .log
                    .push(EventKind::Received, text, &self.handlers),
            },
            Classified::ReplyError { id: _, error } => self.on_protocol_error(error),
            Classified::Notification | Classified::Other | Classified::Unparseable => {
                // Steady-state data path and forward-compatible fallback:
                // one log entry, no status change, never fatal.
                self.log.push(EventKind::Received, text, &self.handlers);
            },
        }
    }

    fn on_subscribe_ack(&mut self, sid: SubscriptionId) {
        self.subscribe_req_id = None;
        self.log.push(
            EventKind::Info,
            format!("Subscription confirmed (id: {})", sid),
            &self.handlers,
        );
        self.state.set_subscription_status(SubscriptionStatus::Active);
        self.state.set_subscription_id(Some(sid));
    }

    fn on_unsubscribe_ack(&mut self) {
        self.state.set_subscription_status(SubscriptionStatus::Idle);
        self.log
            .push(EventKind::Info, "Unsubscribed successfully", &self.handlers);
    }

    /// RPC-level fault: the subscription moves to `Error`, the transport
    /// stays connected.
    fn on_protocol_error(&mut self, message: String) {
        self.state.set_subscription_status(SubscriptionStatus::Error);
        self.log
            .push(EventKind::Error, message.clone(), &self.handlers);
        self.handlers
            .emit_error(ConnectionError::new(message, false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_ws_url_accepts_ws_and_wss() {
        assert!(resolve_ws_url("ws://localhost:3001/ws").is_ok());
        assert!(resolve_ws_url("  wss://api.mainnet-beta.solana.com  ").is_ok());
    }

    #[test]
    fn resolve_ws_url_rejects_other_schemes_and_garbage() {
        assert!(matches!(
            resolve_ws_url("http://localhost:3001"),
            Err(PubsubLinkError::ConfigurationError(_))
        ));
        assert!(matches!(
            resolve_ws_url("not a url"),
            Err(PubsubLinkError::ConfigurationError(_))
        ));
    }
}
