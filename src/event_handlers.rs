//! Connection lifecycle event handlers.
//!
//! Callback-based hooks for observing the manager without polling:
//!
//! - [`on_connect`](EventHandlers::on_connect): fired when the WebSocket opens
//! - [`on_disconnect`](EventHandlers::on_disconnect): fired when it closes
//! - [`on_error`](EventHandlers::on_error): fired on transport or protocol errors
//! - [`on_log`](EventHandlers::on_log): fired once per appended event-log entry
//!
//! All handlers are optional and `Send + Sync` so they work with the tokio
//! runtime. Observers that prefer polling can ignore this module and read
//! status snapshots and the log directly.

use crate::models::LogEvent;
use std::fmt;
use std::sync::Arc;

/// Reason for a disconnect event.
#[derive(Debug, Clone)]
pub struct DisconnectReason {
    /// Human-readable description of why the connection closed.
    pub message: String,
    /// WebSocket close code, if available (e.g. 1000 = normal, 1006 = abnormal).
    pub code: Option<u16>,
}

impl DisconnectReason {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "{} (code: {})", self.message, code)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// Error information passed to the `on_error` handler.
#[derive(Debug, Clone)]
pub struct ConnectionError {
    /// Human-readable error message.
    pub message: String,
    /// Whether this error is recoverable (i.e. auto-reconnect may succeed).
    pub recoverable: bool,
}

impl ConnectionError {
    pub fn new(message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            message: message.into(),
            recoverable,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

pub type OnConnectCallback = Arc<dyn Fn() + Send + Sync>;
pub type OnDisconnectCallback = Arc<dyn Fn(DisconnectReason) + Send + Sync>;
pub type OnErrorCallback = Arc<dyn Fn(ConnectionError) + Send + Sync>;
pub type OnLogCallback = Arc<dyn Fn(&LogEvent) + Send + Sync>;

/// Connection lifecycle event handlers. Builder-style; register only the
/// hooks you need.
#[derive(Clone, Default)]
pub struct EventHandlers {
    pub(crate) on_connect: Option<OnConnectCallback>,
    pub(crate) on_disconnect: Option<OnDisconnectCallback>,
    pub(crate) on_error: Option<OnErrorCallback>,
    pub(crate) on_log: Option<OnLogCallback>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when the WebSocket connection is successfully established.
    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// Called when the WebSocket connection closes, intentionally or not.
    pub fn on_disconnect(mut self, f: impl Fn(DisconnectReason) + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    /// Called on transport errors and RPC error replies.
    pub fn on_error(mut self, f: impl Fn(ConnectionError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Called once for every entry appended to the event log. This is the
    /// change-notification path for observers that do not poll.
    pub fn on_log(mut self, f: impl Fn(&LogEvent) + Send + Sync + 'static) -> Self {
        self.on_log = Some(Arc::new(f));
        self
    }

    pub(crate) fn emit_connect(&self) {
        if let Some(handler) = &self.on_connect {
            handler();
        }
    }

    pub(crate) fn emit_disconnect(&self, reason: DisconnectReason) {
        if let Some(handler) = &self.on_disconnect {
            handler(reason);
        }
    }

    pub(crate) fn emit_error(&self, error: ConnectionError) {
        if let Some(handler) = &self.on_error {
            handler(error);
        }
    }

    pub(crate) fn emit_log(&self, event: &LogEvent) {
        if let Some(handler) = &self.on_log {
            handler(event);
        }
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_log", &self.on_log.is_some())
            .finish()
    }
}
