use crate::domain::entities::ticket::{ActorId, TicketId};
use crate::domain::entities::timeline::AttachmentRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on a single attachment (25 MB).
pub const MAX_ATTACHMENT_SIZE: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentDirection {
    /// Uploaded by the requester.
    Received,
    /// Sent out by support along with a ticket message.
    Sent,
}

impl fmt::Display for AttachmentDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentDirection::Received => write!(f, "received"),
            AttachmentDirection::Sent => write!(f, "sent"),
        }
    }
}

impl std::str::FromStr for AttachmentDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(AttachmentDirection::Received),
            "sent" => Ok(AttachmentDirection::Sent),
            _ => Err(format!("Invalid attachment direction: {}", s)),
        }
    }
}

/// Metadata of a stored attachment. Bytes live in the attachment store
/// under `storage_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub id: String,
    pub ticket_id: TicketId,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub direction: AttachmentDirection,
    pub storage_key: String,
    pub outbound_message_id: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: Option<ActorId>,
}

impl AttachmentRecord {
    pub fn to_ref(&self) -> AttachmentRef {
        AttachmentRef {
            id: self.id.clone(),
            filename: self.filename.clone(),
            mime_type: self.mime_type.clone(),
            size_bytes: self.size_bytes,
        }
    }
}

/// File contents handed to the attachment intake or to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// A ticket message that was delivered to at least one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: String,
    pub ticket_id: TicketId,
    pub subject: String,
    pub recipients: Vec<String>,
    pub text_body: String,
    pub fingerprint: String,
    pub sent_at: DateTime<Utc>,
    pub sent_by: Option<ActorId>,
}

/// One delivery handed to the notification capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub attachments: Vec<FileUpload>,
}
