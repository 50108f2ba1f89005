//! Wire envelope.
//!
//! ```json
//! {"kind":"request-scene-object-prop-value","payload":{...},"correlationId":"host-3"}
//! {"kind":"request-scene-object-prop-value","payload":{"value":1},"correlationId":"host-3","reply":true}
//! ```
//!
//! `correlationId` is present only on request/response exchanges. A response
//! repeats its request's kind and id and sets `reply`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::MessageKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub kind: MessageKind,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub reply: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Envelope {
    /// Fire-and-forget envelope.
    pub fn event(kind: MessageKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            correlation_id: None,
            reply: false,
        }
    }

    /// Request expecting a reply under `id`.
    pub fn request(kind: MessageKind, payload: Value, id: String) -> Self {
        Self {
            kind,
            payload,
            correlation_id: Some(id),
            reply: false,
        }
    }

    /// Response to a request.
    pub fn response(kind: MessageKind, payload: Value, id: String) -> Self {
        Self {
            kind,
            payload,
            correlation_id: Some(id),
            reply: true,
        }
    }

    /// Inbound request that wants an answer.
    #[inline]
    pub fn expects_reply(&self) -> bool {
        !self.reply && self.correlation_id.is_some()
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(frame: &str) -> serde_json::Result<Self> {
        serde_json::from_str(frame)
    }
}
