//! Wire units exchanged over a live connection.
//!
//! Inbound frames look like `{ "type": "message" | "typing", "content": ... }`.
//! Outbound frames are either a pushed message `{ "type": "message", "content": Message }`
//! or an error report `{ "type": "error", "error": "..." }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::message::{Message, NewMessage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    Message(NewMessage),
    Typing,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported envelope type {0:?}")]
    UnsupportedType(String),
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Value,
}

impl Envelope {
    pub fn decode(frame: &[u8]) -> Result<Self, EnvelopeError> {
        let RawEnvelope { kind, content } = serde_json::from_slice(frame)?;

        match kind.as_str() {
            "message" => Ok(Envelope::Message(serde_json::from_value(content)?)),
            "typing" => Ok(Envelope::Typing),
            _ => Err(EnvelopeError::UnsupportedType(kind)),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Outbound<'a> {
    Message { content: &'a Message },
    Error { error: String },
}

impl Outbound<'_> {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::OffsetDateTime;

    use super::*;

    #[test]
    fn decodes_message_without_sender() {
        let frame = json!({
            "type": "message",
            "content": { "toId": "b", "content": "hi" }
        });
        let envelope = Envelope::decode(frame.to_string().as_bytes()).unwrap();
        assert_eq!(envelope, Envelope::Message(NewMessage::new("", "b", "hi")));
    }

    #[test]
    fn typing_ignores_its_content() {
        let frame = br#"{"type":"typing","content":{"anything":[1,2,3]}}"#;
        assert_eq!(Envelope::decode(frame).unwrap(), Envelope::Typing);
        assert_eq!(Envelope::decode(br#"{"type":"typing"}"#).unwrap(), Envelope::Typing);
    }

    #[test]
    fn rejects_unknown_types_and_bad_payloads() {
        assert!(matches!(
            Envelope::decode(br#"{"type":"presence","content":{}}"#),
            Err(EnvelopeError::UnsupportedType(kind)) if kind == "presence"
        ));
        assert!(matches!(Envelope::decode(b"{not json"), Err(EnvelopeError::Malformed(_))));
        assert!(matches!(
            Envelope::decode(br#"{"type":"message","content":{"content":"no recipient"}}"#),
            Err(EnvelopeError::Malformed(_))
        ));
    }

    #[test]
    fn outbound_shapes() {
        let error = Outbound::Error { error: "nope".into() }.encode().unwrap();
        assert_eq!(serde_json::from_str::<Value>(&error).unwrap(), json!({"type": "error", "error": "nope"}));

        let at = OffsetDateTime::UNIX_EPOCH;
        let message = NewMessage::new("a", "b", "hi").into_record("id-1".into(), at);
        let pushed: Value = serde_json::from_str(&Outbound::Message { content: &message }.encode().unwrap()).unwrap();
        assert_eq!(pushed["type"], "message");
        assert_eq!(pushed["content"]["content"], "hi");
        assert_eq!(pushed["content"]["read"], false);
        assert_eq!(pushed["content"]["createdAt"], "1970-01-01T00:00:00Z");
    }
}
