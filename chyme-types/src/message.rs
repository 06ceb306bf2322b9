use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ContactId, DateTime};

// A message id is either a locally generated placeholder for an optimistic
// entry or the backend-assigned id of a durable row. Reconciliation always
// matches on the pending uuid, never on list position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageId {
    Pending(Uuid),
    Confirmed(Uuid),
}

impl MessageId {
    pub fn pending() -> Self {
        Self::Pending(Uuid::now_v7())
    }

    pub fn confirmed() -> Self {
        Self::Confirmed(Uuid::now_v7())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub fn uuid(&self) -> Uuid {
        match self {
            Self::Pending(id) => *id,
            Self::Confirmed(id) => *id,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Voice,
}

impl MessageKind {
    pub fn name(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
        }
    }
}

// Opaque playable/downloadable reference understood by the presentation
// layer; the engine never looks inside.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef(pub String);

impl AttachmentRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttachmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: ContactId,
    pub recipient_id: ContactId,
    // May be empty for placeholder rows.
    pub body: String,
    pub attachment: Option<AttachmentRef>,
    pub kind: MessageKind,
    pub read: bool,
    pub created_at: DateTime,
}

impl Message {
    // True if the message belongs to the conversation between `a` and `b`,
    // in either direction.
    pub fn involves(&self, a: ContactId, b: ContactId) -> bool {
        (self.sender_id == a && self.recipient_id == b)
            || (self.sender_id == b && self.recipient_id == a)
    }
}

// Payload of a durable insert; the backend assigns the confirmed id and the
// authoritative timestamp.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewMessage {
    pub sender_id: ContactId,
    pub recipient_id: ContactId,
    pub body: String,
    pub attachment: Option<AttachmentRef>,
    pub kind: MessageKind,
}
