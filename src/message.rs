use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A persisted direct message. Only `read` and `updated_at` ever change after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub from_id: String,
    pub to_id: String,
    pub content: String,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// What a sender supplies. `from_id` is optional on the wire because the relay
/// overwrites it with the authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    #[serde(default)]
    pub from_id: String,
    pub to_id: String,
    pub content: String,
}

impl NewMessage {
    pub fn new(from_id: impl Into<String>, to_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            content: content.into(),
        }
    }

    pub(crate) fn into_record(self, id: String, at: OffsetDateTime) -> Message {
        Message {
            id,
            from_id: self.from_id,
            to_id: self.to_id,
            content: self.content,
            read: false,
            created_at: at,
            updated_at: at,
        }
    }
}
