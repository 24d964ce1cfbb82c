//! Request codec: pure builders that shape typed subscription parameters
//! into positional-argument JSON-RPC envelopes, plus the fixed
//! subscribe-to-unsubscribe method table.
//!
//! This module is stateless and performs no I/O. Numeric fields arriving as
//! user-entered strings (filter offsets and data sizes) are expected to be
//! validated upstream; a malformed integer here is a caller bug and fails
//! fast with [`PubsubLinkError::InvalidRequest`].

use crate::error::{PubsubLinkError, Result};
use crate::models::{JsonRpcRequest, SubscriptionId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::fmt;

/// The closed set of supported subscription methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionMethod {
    #[serde(rename = "programSubscribe")]
    ProgramSubscribe,
    #[serde(rename = "accountSubscribe")]
    AccountSubscribe,
    #[serde(rename = "logsSubscribe")]
    LogsSubscribe,
    #[serde(rename = "slotSubscribe")]
    SlotSubscribe,
    #[serde(rename = "signatureSubscribe")]
    SignatureSubscribe,
    #[serde(rename = "rootSubscribe")]
    RootSubscribe,
}

impl SubscriptionMethod {
    /// Wire name of the subscribe method.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionMethod::ProgramSubscribe => "programSubscribe",
            SubscriptionMethod::AccountSubscribe => "accountSubscribe",
            SubscriptionMethod::LogsSubscribe => "logsSubscribe",
            SubscriptionMethod::SlotSubscribe => "slotSubscribe",
            SubscriptionMethod::SignatureSubscribe => "signatureSubscribe",
            SubscriptionMethod::RootSubscribe => "rootSubscribe",
        }
    }

    /// Wire name of the paired unsubscribe method. The table is total over
    /// the closed method set, so adding a method without its unsubscribe
    /// pairing is a compile error.
    pub fn unsubscribe_method(&self) -> &'static str {
        match self {
            SubscriptionMethod::ProgramSubscribe => "programUnsubscribe",
            SubscriptionMethod::AccountSubscribe => "accountUnsubscribe",
            SubscriptionMethod::LogsSubscribe => "logsUnsubscribe",
            SubscriptionMethod::SlotSubscribe => "slotUnsubscribe",
            SubscriptionMethod::SignatureSubscribe => "signatureUnsubscribe",
            SubscriptionMethod::RootSubscribe => "rootUnsubscribe",
        }
    }
}

impl fmt::Display for SubscriptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ledger-finality tier, passed through opaquely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

/// Account-data encoding for `programSubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    #[serde(rename = "base64")]
    Base64,
    #[serde(rename = "base64+zstd")]
    Base64Zstd,
    #[serde(rename = "jsonParsed")]
    JsonParsed,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Base64 => "base64",
            Encoding::Base64Zstd => "base64+zstd",
            Encoding::JsonParsed => "jsonParsed",
        }
    }
}

/// Account-data encoding for `accountSubscribe` (adds `base58`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountEncoding {
    #[serde(rename = "base58")]
    Base58,
    #[serde(rename = "base64")]
    Base64,
    #[serde(rename = "base64+zstd")]
    Base64Zstd,
    #[serde(rename = "jsonParsed")]
    JsonParsed,
}

impl AccountEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountEncoding::Base58 => "base58",
            AccountEncoding::Base64 => "base64",
            AccountEncoding::Base64Zstd => "base64+zstd",
            AccountEncoding::JsonParsed => "jsonParsed",
        }
    }
}

/// Account-data filter for `programSubscribe`. Numeric fields carry the raw
/// user-entered strings; the codec parses them during envelope construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Filter {
    /// Match accounts whose data length equals `value`.
    DataSize { value: String },
    /// Match accounts whose data at `offset` equals `bytes`.
    Memcmp { offset: String, bytes: String },
}

/// Log filter mode for `logsSubscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogsFilter {
    /// All transactions except simple vote transactions.
    All,
    /// All transactions including votes.
    AllWithVotes,
    /// Only transactions mentioning the given address.
    Mentions(String),
}

/// Typed per-method subscription parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeParams {
    Program {
        program_id: String,
        commitment: Commitment,
        encoding: Encoding,
        filters: Vec<Filter>,
    },
    Account {
        account_id: String,
        commitment: Commitment,
        encoding: AccountEncoding,
    },
    Logs {
        filter: LogsFilter,
        commitment: Commitment,
    },
    Signature {
        signature: String,
        commitment: Commitment,
        enable_received_notification: bool,
    },
    Slot,
    Root,
}

impl SubscribeParams {
    /// The subscribe method these parameters belong to.
    pub fn method(&self) -> SubscriptionMethod {
        match self {
            SubscribeParams::Program { .. } => SubscriptionMethod::ProgramSubscribe,
            SubscribeParams::Account { .. } => SubscriptionMethod::AccountSubscribe,
            SubscribeParams::Logs { .. } => SubscriptionMethod::LogsSubscribe,
            SubscribeParams::Signature { .. } => SubscriptionMethod::SignatureSubscribe,
            SubscribeParams::Slot => SubscriptionMethod::SlotSubscribe,
            SubscribeParams::Root => SubscriptionMethod::RootSubscribe,
        }
    }
}

/// A subscribe request ready to hand to the connection manager: the wire
/// envelope plus the method, which the manager needs later to format the
/// paired unsubscribe.
#[derive(Debug, Clone)]
pub struct SubscribeRequest {
    pub method: SubscriptionMethod,
    pub envelope: JsonRpcRequest,
}

fn parse_int_field(field: &str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|_| {
        PubsubLinkError::InvalidRequest(format!("{} is not a valid integer: '{}'", field, raw))
    })
}

fn build_filter_param(filter: &Filter) -> Result<JsonValue> {
    match filter {
        Filter::DataSize { value } => Ok(json!({ "dataSize": parse_int_field("dataSize", value)? })),
        Filter::Memcmp { offset, bytes } => Ok(json!({
            "memcmp": {
                "offset": parse_int_field("memcmp offset", offset)?,
                "bytes": bytes.trim(),
            }
        })),
    }
}

/// Build the numbered subscribe envelope for the given parameters.
pub fn build_request(params: &SubscribeParams, request_id: u64) -> Result<SubscribeRequest> {
    let method = params.method();
    let positional = match params {
        SubscribeParams::Program {
            program_id,
            commitment,
            encoding,
            filters,
        } => {
            let mut config = json!({
                "commitment": commitment.as_str(),
                "encoding": encoding.as_str(),
            });
            if !filters.is_empty() {
                let shaped = filters
                    .iter()
                    .map(build_filter_param)
                    .collect::<Result<Vec<_>>>()?;
                config["filters"] = JsonValue::Array(shaped);
            }
            Some(json!([program_id.trim(), config]))
        },
        SubscribeParams::Account {
            account_id,
            commitment,
            encoding,
        } => Some(json!([
            account_id.trim(),
            { "commitment": commitment.as_str(), "encoding": encoding.as_str() }
        ])),
        SubscribeParams::Logs { filter, commitment } => {
            let filter_value = match filter {
                LogsFilter::All => json!("all"),
                LogsFilter::AllWithVotes => json!("allWithVotes"),
                LogsFilter::Mentions(address) => json!({ "mentions": [address.trim()] }),
            };
            Some(json!([filter_value, { "commitment": commitment.as_str() }]))
        },
        SubscribeParams::Signature {
            signature,
            commitment,
            enable_received_notification,
        } => Some(json!([
            signature.trim(),
            {
                "commitment": commitment.as_str(),
                "enableReceivedNotification": enable_received_notification,
            }
        ])),
        SubscribeParams::Slot | SubscribeParams::Root => None,
    };

    Ok(SubscribeRequest {
        method,
        envelope: JsonRpcRequest::new(request_id, method.as_str(), positional),
    })
}

/// Build the unsubscribe envelope paired with `method`, carrying the
/// server-assigned subscription id as the sole positional argument.
pub fn build_unsubscribe_request(
    method: SubscriptionMethod,
    subscription_id: &SubscriptionId,
    request_id: u64,
) -> JsonRpcRequest {
    JsonRpcRequest::new(
        request_id,
        method.unsubscribe_method(),
        Some(json!([subscription_id.to_json()])),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const METHODS: [SubscriptionMethod; 6] = [
        SubscriptionMethod::ProgramSubscribe,
        SubscriptionMethod::AccountSubscribe,
        SubscriptionMethod::LogsSubscribe,
        SubscriptionMethod::SlotSubscribe,
        SubscriptionMethod::SignatureSubscribe,
        SubscriptionMethod::RootSubscribe,
    ];

    #[test]
    fn subscribe_and_unsubscribe_methods_pair_correctly() {
        for method in METHODS {
            let expected = method.as_str().replace("Subscribe", "Unsubscribe");
            assert_eq!(method.unsubscribe_method(), expected);
        }
    }

    #[test]
    fn program_subscribe_shapes_filters() {
        let params = SubscribeParams::Program {
            program_id: "  TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA  ".to_string(),
            commitment: Commitment::Confirmed,
            encoding: Encoding::Base64,
            filters: vec![
                Filter::DataSize {
                    value: "165".to_string(),
                },
                Filter::Memcmp {
                    offset: "0".to_string(),
                    bytes: " abc ".to_string(),
                },
            ],
        };
        let req = build_request(&params, 1).unwrap();
        let positional = req.envelope.params.unwrap();

        assert_eq!(positional[0], "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
        assert_eq!(positional[1]["filters"][0], json!({ "dataSize": 165 }));
        assert_eq!(
            positional[1]["filters"][1],
            json!({ "memcmp": { "offset": 0, "bytes": "abc" } })
        );
    }

    #[test]
    fn program_subscribe_omits_empty_filters() {
        let params = SubscribeParams::Program {
            program_id: "prog".to_string(),
            commitment: Commitment::Finalized,
            encoding: Encoding::JsonParsed,
            filters: vec![],
        };
        let req = build_request(&params, 2).unwrap();
        let config = &req.envelope.params.unwrap()[1];
        assert!(config.get("filters").is_none());
        assert_eq!(config["encoding"], "jsonParsed");
    }

    #[test]
    fn malformed_filter_integer_fails_fast() {
        let params = SubscribeParams::Program {
            program_id: "prog".to_string(),
            commitment: Commitment::Confirmed,
            encoding: Encoding::Base64,
            filters: vec![Filter::DataSize {
                value: "not-a-number".to_string(),
            }],
        };
        let err = build_request(&params, 3).unwrap_err();
        assert!(matches!(err, PubsubLinkError::InvalidRequest(_)));
    }

    #[test]
    fn logs_subscribe_mentions_mode() {
        let params = SubscribeParams::Logs {
            filter: LogsFilter::Mentions(" addr1 ".to_string()),
            commitment: Commitment::Processed,
        };
        let req = build_request(&params, 4).unwrap();
        let positional = req.envelope.params.unwrap();
        assert_eq!(positional[0], json!({ "mentions": ["addr1"] }));
        assert_eq!(positional[1], json!({ "commitment": "processed" }));
    }

    #[test]
    fn logs_subscribe_literal_modes() {
        for (filter, literal) in [
            (LogsFilter::All, "all"),
            (LogsFilter::AllWithVotes, "allWithVotes"),
        ] {
            let params = SubscribeParams::Logs {
                filter,
                commitment: Commitment::Confirmed,
            };
            let req = build_request(&params, 5).unwrap();
            assert_eq!(req.envelope.params.unwrap()[0], literal);
        }
    }

    #[test]
    fn signature_subscribe_carries_received_notification_flag() {
        let params = SubscribeParams::Signature {
            signature: "sig".to_string(),
            commitment: Commitment::Finalized,
            enable_received_notification: true,
        };
        let req = build_request(&params, 6).unwrap();
        let config = &req.envelope.params.unwrap()[1];
        assert_eq!(config["enableReceivedNotification"], true);
    }

    #[test]
    fn slot_and_root_subscribe_have_no_params() {
        for params in [SubscribeParams::Slot, SubscribeParams::Root] {
            let req = build_request(&params, 7).unwrap();
            assert!(req.envelope.params.is_none());
        }
    }

    #[test]
    fn unsubscribe_envelope_carries_subscription_id() {
        let req = build_unsubscribe_request(
            SubscriptionMethod::SlotSubscribe,
            &SubscriptionId::Number(42),
            8,
        );
        assert_eq!(req.method, "slotUnsubscribe");
        assert_eq!(req.params, Some(json!([42])));

        let req = build_unsubscribe_request(
            SubscriptionMethod::ProgramSubscribe,
            &SubscriptionId::from("sub-1"),
            9,
        );
        assert_eq!(req.method, "programUnsubscribe");
        assert_eq!(req.params, Some(json!(["sub-1"])));
    }
}
