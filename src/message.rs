//! Inbound frame classification.
//!
//! Every text frame is sorted into one of a small set of shapes. Two ack
//! flavors are supported: a correlated JSON-RPC reply from the upstream
//! service (`{"id":1,"result":42}`), and an explicit tagged envelope from a
//! mediating proxy (`{"type":"subscribed","subscriptionId":...}`).
//! Classification is total: unknown shapes fall through to [`Classified::Other`]
//! and unparseable payloads to [`Classified::Unparseable`], never an error.

use crate::models::SubscriptionId;
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Suffix identifying server-push notification methods.
const NOTIFICATION_SUFFIX: &str = "Notification";

/// Tagged envelope shape used when the endpoint is a mediating proxy.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ProxyMessage {
    Subscribed {
        #[serde(rename = "subscriptionId")]
        subscription_id: SubscriptionId,
    },
    Unsubscribed {
        #[serde(rename = "subscriptionId")]
        #[allow(dead_code)]
        subscription_id: Option<SubscriptionId>,
    },
    Error {
        message: Option<String>,
    },
}

/// Correlated JSON-RPC reply shape.
#[derive(Debug, Deserialize)]
struct RpcReply {
    id: u64,
    #[serde(default)]
    result: Option<JsonValue>,
    #[serde(default)]
    error: Option<JsonValue>,
}

/// Result of classifying one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// Proxy confirmed the subscription and assigned an id.
    ProxySubscribed(SubscriptionId),
    /// Proxy confirmed the unsubscribe.
    ProxyUnsubscribed,
    /// Proxy-reported error.
    ProxyError(String),
    /// Correlated reply carrying a result. The manager resolves whether it
    /// acknowledges the subscribe or the unsubscribe (by request id and
    /// result shape).
    ReplyResult { id: u64, result: ReplyResult },
    /// Correlated reply carrying an error object (stringified for logging).
    ReplyError { id: u64, error: String },
    /// Server-push notification (`method` ends in `"Notification"`).
    Notification,
    /// Well-formed JSON of an unknown shape.
    Other,
    /// Payload failed to parse as JSON.
    Unparseable,
}

/// The result field of a correlated reply, reduced to the shapes the
/// protocol assigns meaning to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyResult {
    /// Numeric or string result: a freshly assigned subscription id.
    SubscriptionId(SubscriptionId),
    /// Boolean result: the unsubscribe success sentinel.
    Bool(bool),
    /// Anything else.
    Other,
}

/// Classify one inbound text frame.
pub fn classify(text: &str) -> Classified {
    let value: JsonValue = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => return Classified::Unparseable,
    };

    // Proxy envelope: tagged with "type".
    if value.get("type").is_some() {
        if let Ok(msg) = serde_json::from_value::<ProxyMessage>(value.clone()) {
            return match msg {
                ProxyMessage::Subscribed { subscription_id } => {
                    Classified::ProxySubscribed(subscription_id)
                },
                ProxyMessage::Unsubscribed { .. } => Classified::ProxyUnsubscribed,
                ProxyMessage::Error { message } => {
                    Classified::ProxyError(message.unwrap_or_else(|| value.to_string()))
                },
            };
        }
    }

    // Correlated reply: carries "id" plus "result" or "error".
    if let Ok(reply) = serde_json::from_value::<RpcReply>(value.clone()) {
        if let Some(error) = reply.error {
            return Classified::ReplyError {
                id: reply.id,
                error: error.to_string(),
            };
        }
        if let Some(result) = reply.result {
            let result = match result {
                JsonValue::Bool(b) => ReplyResult::Bool(b),
                JsonValue::Number(n) => match n.as_u64() {
                    Some(n) => ReplyResult::SubscriptionId(SubscriptionId::Number(n)),
                    None => ReplyResult::Other,
                },
                JsonValue::String(s) => ReplyResult::SubscriptionId(SubscriptionId::String(s)),
                _ => ReplyResult::Other,
            };
            return Classified::ReplyResult {
                id: reply.id,
                result,
            };
        }
    }

    // Server-push notification.
    if let Some(method) = value.get("method").and_then(JsonValue::as_str) {
        if method.ends_with(NOTIFICATION_SUFFIX) {
            return Classified::Notification;
        }
    }

    Classified::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_numeric_reply_as_subscription_id() {
        let classified = classify(r#"{"jsonrpc":"2.0","id":1,"result":42}"#);
        assert_eq!(
            classified,
            Classified::ReplyResult {
                id: 1,
                result: ReplyResult::SubscriptionId(SubscriptionId::Number(42)),
            }
        );
    }

    #[test]
    fn classifies_boolean_reply_as_unsubscribe_sentinel() {
        let classified = classify(r#"{"jsonrpc":"2.0","id":2,"result":true}"#);
        assert_eq!(
            classified,
            Classified::ReplyResult {
                id: 2,
                result: ReplyResult::Bool(true),
            }
        );
    }

    #[test]
    fn classifies_error_reply() {
        let classified =
            classify(r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32602,"message":"bad params"}}"#);
        match classified {
            Classified::ReplyError { id: 3, error } => {
                assert!(error.contains("bad params"));
            },
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn classifies_proxy_envelopes() {
        assert_eq!(
            classify(r#"{"type":"subscribed","subscriptionId":"sub-9","method":"slotSubscribe"}"#),
            Classified::ProxySubscribed(SubscriptionId::from("sub-9")),
        );
        assert_eq!(
            classify(r#"{"type":"unsubscribed","subscriptionId":"sub-9"}"#),
            Classified::ProxyUnsubscribed,
        );
        assert_eq!(
            classify(r#"{"type":"error","message":"upstream refused"}"#),
            Classified::ProxyError("upstream refused".to_string()),
        );
    }

    #[test]
    fn classifies_notifications_by_method_suffix() {
        let classified = classify(
            r#"{"jsonrpc":"2.0","method":"slotNotification","params":{"subscription":42,"result":{"slot":100}}}"#,
        );
        assert_eq!(classified, Classified::Notification);
    }

    #[test]
    fn unknown_shapes_fall_through_to_other() {
        assert_eq!(classify(r#"{"hello":"world"}"#), Classified::Other);
        assert_eq!(
            classify(r#"{"method":"somethingElse","params":[]}"#),
            Classified::Other,
        );
    }

    #[test]
    fn unparseable_payload_is_never_an_error() {
        assert_eq!(classify("not json at all"), Classified::Unparseable);
        assert_eq!(classify(""), Classified::Unparseable);
    }
}
