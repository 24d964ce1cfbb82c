//! Client-side connection and subscription lifecycle manager for
//! JSON-RPC-over-WebSocket pub/sub endpoints.
//!
//! The service model is subscribe/notify: the client issues a subscribe call,
//! receives an acknowledgement carrying a server-assigned subscription id,
//! and then an unbounded stream of push notifications correlated by that id.
//! This crate provides:
//!
//! - A pure [request codec](crate::request) that shapes typed parameters into
//!   positional-argument JSON-RPC envelopes, including the paired unsubscribe
//!   envelope for every supported method
//! - A [`ConnectionManager`] that owns exactly one socket, classifies every
//!   inbound frame, tracks connection and subscription status independently,
//!   appends everything sent and received to an ordered [event
//!   log](crate::event_log), and reconnects with exponential backoff after
//!   unexpected disconnects, replaying the last subscribe request
//!
//! # Example
//!
//! ```rust,no_run
//! use pubsub_link::{build_request, ConnectionManager, SubscribeParams};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConnectionManager::new();
//! let request = build_request(&SubscribeParams::Slot, 1)?;
//! manager.connect("wss://api.mainnet-beta.solana.com", request).await?;
//!
//! for event in manager.recent_events() {
//!     println!("[{}] {}", event.kind, event.payload);
//! }
//!
//! manager.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod event_handlers;
pub mod event_log;
pub mod message;
pub mod models;
pub mod options;
pub mod request;

pub use connection::ConnectionManager;
pub use error::{PubsubLinkError, Result};
pub use event_handlers::{ConnectionError, DisconnectReason, EventHandlers};
pub use event_log::{EventLog, RECENT_EVENT_LIMIT};
pub use message::{classify, Classified, ReplyResult};
pub use models::{
    ConnectionStatus, EventKind, JsonRpcRequest, LogEvent, SubscriptionId, SubscriptionStatus,
};
pub use options::ConnectionOptions;
pub use request::{
    build_request, build_unsubscribe_request, AccountEncoding, Commitment, Encoding, Filter,
    LogsFilter, SubscribeParams, SubscribeRequest, SubscriptionMethod,
};
