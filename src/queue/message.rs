/// Queue message types
///
/// Mirrors the `ReceiveMessage` response shape: a `Messages` array whose
/// elements carry a JSON-encoded `Body`.

use serde::{Deserialize, Deserializer};

/// Opaque envelope handed out by the queue
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawMessage {
    /// Queue-assigned identifier, for log correlation only
    #[serde(rename = "MessageId", default)]
    pub message_id: Option<String>,

    /// JSON-encoded login record, exactly as delivered
    ///
    /// Kept as bytes so a payload that is not UTF-8 reaches the transformer
    /// unaltered and is rejected there.
    #[serde(rename = "Body", deserialize_with = "string_bytes")]
    pub body: Vec<u8>,
}

impl RawMessage {
    /// Create a message without a queue identifier
    pub fn new(body: impl Into<String>) -> Self {
        Self::from_payload(None, body.into().into_bytes())
    }

    /// Wrap a raw payload as received from the broker
    pub fn from_payload(message_id: Option<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            message_id,
            body: payload.into(),
        }
    }
}

fn string_bytes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    String::deserialize(deserializer).map(String::into_bytes)
}

/// Body of a `ReceiveMessage` response
///
/// SQS omits `Messages` entirely when the queue is empty.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiveResponse {
    #[serde(rename = "Messages", default)]
    pub messages: Option<Vec<RawMessage>>,
}
