//! Shared data types: connection/subscription statuses, subscription
//! identifiers, JSON-RPC envelopes, and event-log entries.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// WebSocket transport state. Describes only the socket, not the
/// subscription layered on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No active connection.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Socket open and ready.
    Connected,
    /// Connection failed or dropped unexpectedly.
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Error => write!(f, "error"),
        }
    }
}

/// Subscription lifecycle state, independent of [`ConnectionStatus`]. The
/// transport can be `Connected` while the subscription is still `Idle`
/// (between socket open and the subscribe acknowledgement).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// No subscription requested.
    Idle,
    /// Subscribe message sent, awaiting confirmation.
    Subscribing,
    /// Subscription confirmed, receiving notifications.
    Active,
    /// Subscription rejected or failed.
    Error,
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionStatus::Idle => write!(f, "idle"),
            SubscriptionStatus::Subscribing => write!(f, "subscribing"),
            SubscriptionStatus::Active => write!(f, "active"),
            SubscriptionStatus::Error => write!(f, "error"),
        }
    }
}

/// Server-assigned subscription identifier.
///
/// The upstream RPC service issues numeric ids; a mediating proxy may issue
/// opaque string ids instead. Both are accepted and passed back verbatim in
/// the unsubscribe envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubscriptionId {
    Number(u64),
    String(String),
}

impl SubscriptionId {
    /// JSON value to embed in an unsubscribe `params` array.
    pub fn to_json(&self) -> JsonValue {
        match self {
            SubscriptionId::Number(n) => JsonValue::from(*n),
            SubscriptionId::String(s) => JsonValue::from(s.clone()),
        }
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionId::Number(n) => write!(f, "{}", n),
            SubscriptionId::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<u64> for SubscriptionId {
    fn from(n: u64) -> Self {
        SubscriptionId::Number(n)
    }
}

impl From<&str> for SubscriptionId {
    fn from(s: &str) -> Self {
        SubscriptionId::String(s.to_string())
    }
}

/// Outgoing JSON-RPC 2.0 request envelope.
///
/// `params` is omitted entirely (not serialized as `null`) for methods that
/// take no parameters, such as `slotSubscribe` and `rootSubscribe`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Client-assigned request id, echoed back in the correlated reply.
    pub id: u64,
    /// RPC method name.
    pub method: String,
    /// Positional arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<JsonValue>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<JsonValue>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params,
        }
    }

    /// Serialize to the wire representation.
    pub fn to_wire(&self) -> crate::error::Result<String> {
        serde_json::to_string(self).map_err(|e| {
            crate::error::PubsubLinkError::SerializationError(format!(
                "Failed to serialize request: {}",
                e
            ))
        })
    }
}

/// Kind of an event-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Outgoing request payload.
    Sent,
    /// Inbound frame (notification or unclassified message).
    Received,
    /// Transport or protocol error.
    Error,
    /// Lifecycle information (connected, acknowledged, reconnecting, ...).
    Info,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Sent => write!(f, "sent"),
            EventKind::Received => write!(f, "received"),
            EventKind::Error => write!(f, "error"),
            EventKind::Info => write!(f, "info"),
        }
    }
}

/// A single entry in the ordered event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// Strictly increasing, process-wide unique id. Consumers can key or
    /// deduplicate on it.
    pub id: u64,
    /// Millis since Unix epoch when the entry was appended.
    pub timestamp_ms: u64,
    /// Event kind.
    pub kind: EventKind,
    /// Raw payload or human-readable message.
    pub payload: String,
}

/// Current time in millis since Unix epoch.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_id_accepts_numeric_and_string_forms() {
        let n: SubscriptionId = serde_json::from_str("42").unwrap();
        assert_eq!(n, SubscriptionId::Number(42));

        let s: SubscriptionId = serde_json::from_str("\"sub-abc\"").unwrap();
        assert_eq!(s, SubscriptionId::String("sub-abc".to_string()));
        assert_eq!(s.to_string(), "sub-abc");
    }

    #[test]
    fn request_without_params_omits_the_key() {
        let req = JsonRpcRequest::new(7, "slotSubscribe", None);
        let wire = req.to_wire().unwrap();
        assert!(!wire.contains("params"));
        assert!(wire.contains("\"jsonrpc\":\"2.0\""));
        assert!(wire.contains("\"id\":7"));
    }
}
