use crate::domain::entities::sla::SlaOutcome;
use crate::domain::entities::ticket::{ActorId, TicketId, TicketStatus};
use crate::domain::errors::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Maximum number of events a single timeline page may return.
pub const MAX_PAGE_SIZE: i64 = 500;
pub const DEFAULT_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventKind {
    Created,
    StatusChanged,
    AttachmentReceived,
    AttachmentSent,
    TicketSent,
}

impl TimelineEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineEventKind::Created => "created",
            TimelineEventKind::StatusChanged => "status_changed",
            TimelineEventKind::AttachmentReceived => "attachment_received",
            TimelineEventKind::AttachmentSent => "attachment_sent",
            TimelineEventKind::TicketSent => "ticket_sent",
        }
    }
}

impl fmt::Display for TimelineEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TimelineEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(TimelineEventKind::Created),
            "status_changed" => Ok(TimelineEventKind::StatusChanged),
            "attachment_received" => Ok(TimelineEventKind::AttachmentReceived),
            "attachment_sent" => Ok(TimelineEventKind::AttachmentSent),
            "ticket_sent" => Ok(TimelineEventKind::TicketSent),
            _ => Err(format!("Invalid timeline event kind: {}", s)),
        }
    }
}

/// Reference to a stored attachment. The timeline never holds the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

/// Kind-specific content of a timeline event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelinePayload {
    Created {
        status: TicketStatus,
    },
    StatusChanged {
        before: TicketStatus,
        after: TicketStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sla: Option<SlaOutcome>,
    },
    AttachmentReceived {
        attachment: AttachmentRef,
    },
    AttachmentSent {
        attachment: AttachmentRef,
    },
    TicketSent {
        subject: String,
        recipients: Vec<String>,
        fingerprint: String,
    },
}

impl TimelinePayload {
    pub fn kind(&self) -> TimelineEventKind {
        match self {
            TimelinePayload::Created { .. } => TimelineEventKind::Created,
            TimelinePayload::StatusChanged { .. } => TimelineEventKind::StatusChanged,
            TimelinePayload::AttachmentReceived { .. } => TimelineEventKind::AttachmentReceived,
            TimelinePayload::AttachmentSent { .. } => TimelineEventKind::AttachmentSent,
            TimelinePayload::TicketSent { .. } => TimelineEventKind::TicketSent,
        }
    }

    /// Identity of the underlying fact, used to keep backfill idempotent.
    pub fn natural_key(&self) -> String {
        match self {
            TimelinePayload::Created { .. } => "created".to_string(),
            TimelinePayload::StatusChanged { after, .. } => after.as_str().to_string(),
            TimelinePayload::AttachmentReceived { attachment }
            | TimelinePayload::AttachmentSent { attachment } => attachment.id.clone(),
            TimelinePayload::TicketSent { fingerprint, .. } => fingerprint.clone(),
        }
    }

    pub fn status_change(&self) -> (Option<TicketStatus>, Option<TicketStatus>) {
        match self {
            TimelinePayload::Created { status } => (None, Some(*status)),
            TimelinePayload::StatusChanged { before, after, .. } => (Some(*before), Some(*after)),
            _ => (None, None),
        }
    }

    pub fn attachment(&self) -> Option<&AttachmentRef> {
        match self {
            TimelinePayload::AttachmentReceived { attachment }
            | TimelinePayload::AttachmentSent { attachment } => Some(attachment),
            _ => None,
        }
    }

    /// Kind-specific metadata as stored in the `metadata` column.
    pub fn metadata(&self) -> DomainResult<Option<serde_json::Value>> {
        let value = match self {
            TimelinePayload::Created { .. } => return Ok(None),
            TimelinePayload::StatusChanged { sla: None, .. } => return Ok(None),
            TimelinePayload::StatusChanged { sla: Some(sla), .. } => {
                serde_json::json!({ "sla": sla })
            }
            TimelinePayload::AttachmentReceived { attachment } => {
                serde_json::json!({
                    "filename": attachment.filename,
                    "mime_type": attachment.mime_type,
                    "size_bytes": attachment.size_bytes,
                    "origin": "requester",
                })
            }
            TimelinePayload::AttachmentSent { attachment } => {
                serde_json::json!({
                    "filename": attachment.filename,
                    "mime_type": attachment.mime_type,
                    "size_bytes": attachment.size_bytes,
                    "origin": "support",
                })
            }
            TimelinePayload::TicketSent {
                subject,
                recipients,
                fingerprint,
            } => serde_json::json!({
                "subject": subject,
                "recipients": recipients,
                "fingerprint": fingerprint,
            }),
        };
        Ok(Some(value))
    }

    /// Rebuild a payload from its stored columns.
    pub fn from_columns(
        kind: TimelineEventKind,
        status_before: Option<TicketStatus>,
        status_after: Option<TicketStatus>,
        attachment_id: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> DomainResult<Self> {
        let missing = |what: &str| {
            DomainError::DataIntegrity(format!("{} event is missing {}", kind, what))
        };
        let meta = metadata.unwrap_or(serde_json::Value::Null);
        let attachment = |meta: &serde_json::Value| -> DomainResult<AttachmentRef> {
            Ok(AttachmentRef {
                id: attachment_id.clone().ok_or_else(|| missing("attachment_id"))?,
                filename: meta["filename"].as_str().unwrap_or_default().to_string(),
                mime_type: meta["mime_type"]
                    .as_str()
                    .unwrap_or("application/octet-stream")
                    .to_string(),
                size_bytes: meta["size_bytes"].as_i64().unwrap_or(0),
            })
        };

        match kind {
            TimelineEventKind::Created => Ok(TimelinePayload::Created {
                status: status_after.unwrap_or(TicketStatus::Open),
            }),
            TimelineEventKind::StatusChanged => Ok(TimelinePayload::StatusChanged {
                before: status_before.ok_or_else(|| missing("status_before"))?,
                after: status_after.ok_or_else(|| missing("status_after"))?,
                sla: match meta.get("sla") {
                    Some(sla) => Some(serde_json::from_value(sla.clone()).map_err(|e| {
                        DomainError::DataIntegrity(format!("Invalid SLA metadata: {}", e))
                    })?),
                    None => None,
                },
            }),
            TimelineEventKind::AttachmentReceived => Ok(TimelinePayload::AttachmentReceived {
                attachment: attachment(&meta)?,
            }),
            TimelineEventKind::AttachmentSent => Ok(TimelinePayload::AttachmentSent {
                attachment: attachment(&meta)?,
            }),
            TimelineEventKind::TicketSent => Ok(TimelinePayload::TicketSent {
                subject: meta["subject"].as_str().unwrap_or_default().to_string(),
                recipients: meta["recipients"]
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default(),
                fingerprint: meta["fingerprint"]
                    .as_str()
                    .ok_or_else(|| missing("fingerprint"))?
                    .to_string(),
            }),
        }
    }
}

/// An immutable fact in a ticket's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: i64,
    pub ticket_id: TicketId,
    pub actor_id: Option<ActorId>,
    pub description: String,
    pub payload: TimelinePayload,
    pub created_at: DateTime<Utc>,
}

impl TimelineEvent {
    pub fn kind(&self) -> TimelineEventKind {
        self.payload.kind()
    }
}

/// An event before the store assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTimelineEvent {
    pub ticket_id: TicketId,
    pub actor_id: Option<ActorId>,
    pub description: String,
    pub payload: TimelinePayload,
    pub created_at: DateTime<Utc>,
}

impl NewTimelineEvent {
    pub fn into_event(self, id: i64) -> TimelineEvent {
        TimelineEvent {
            id,
            ticket_id: self.ticket_id,
            actor_id: self.actor_id,
            description: self.description,
            payload: self.payload,
            created_at: self.created_at,
        }
    }
}

/// Cursor for an incremental timeline read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimelineQuery {
    pub since_id: Option<i64>,
    pub since: Option<DateTime<Utc>>,
    pub limit: i64,
}

impl TimelineQuery {
    pub fn new(since_id: Option<i64>, since: Option<DateTime<Utc>>, limit: Option<i64>) -> Self {
        Self {
            since_id,
            // The id cursor is exact; the timestamp is only a fallback.
            since: if since_id.is_some() { None } else { since },
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// Aggregate of a timeline page, computed without materialising its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageSummary {
    pub last_id: i64,
    pub count: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Who an actor is, for timeline display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Support,
    Requester,
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Support => "support",
            ActorRole::Requester => "requester",
            ActorRole::System => "system",
        }
    }

    /// Role implied by an event kind when the actor is unknown.
    pub fn implied_by(kind: TimelineEventKind) -> Self {
        match kind {
            TimelineEventKind::AttachmentSent
            | TimelineEventKind::TicketSent
            | TimelineEventKind::StatusChanged => ActorRole::Support,
            TimelineEventKind::AttachmentReceived | TimelineEventKind::Created => {
                ActorRole::Requester
            }
        }
    }
}

impl std::str::FromStr for ActorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "support" => Ok(ActorRole::Support),
            "requester" => Ok(ActorRole::Requester),
            "system" => Ok(ActorRole::System),
            _ => Err(format!("Invalid actor role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub role: ActorRole,
}

/// An event joined with its actor, as returned to timeline readers.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub event: TimelineEvent,
    pub actor: Option<Actor>,
}

impl TimelineEntry {
    pub fn actor_role(&self) -> ActorRole {
        self.actor
            .as_ref()
            .map(|actor| actor.role)
            .unwrap_or_else(|| ActorRole::implied_by(self.event.kind()))
    }
}

/// Content fingerprint of an outbound message.
pub fn message_fingerprint(subject: &str, recipients: &[String], body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(subject.as_bytes());
    hasher.update([0u8]);
    for recipient in recipients {
        hasher.update(recipient.to_lowercase().as_bytes());
        hasher.update([b',']);
    }
    hasher.update([0u8]);
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment() -> AttachmentRef {
        AttachmentRef {
            id: "att-1".to_string(),
            filename: "screenshot.png".to_string(),
            mime_type: "image/png".to_string(),
            size_bytes: 2048,
        }
    }

    #[test]
    fn test_kind_strings_are_stable() {
        for (kind, s) in [
            (TimelineEventKind::Created, "created"),
            (TimelineEventKind::StatusChanged, "status_changed"),
            (TimelineEventKind::AttachmentReceived, "attachment_received"),
            (TimelineEventKind::AttachmentSent, "attachment_sent"),
            (TimelineEventKind::TicketSent, "ticket_sent"),
        ] {
            assert_eq!(kind.as_str(), s);
            assert_eq!(s.parse::<TimelineEventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_attachment_payload_restores_from_columns() {
        let payload = TimelinePayload::AttachmentSent {
            attachment: attachment(),
        };
        let restored = TimelinePayload::from_columns(
            TimelineEventKind::AttachmentSent,
            None,
            None,
            Some("att-1".to_string()),
            payload.metadata().unwrap(),
        )
        .unwrap();
        assert_eq!(restored, payload);
        assert_eq!(restored.natural_key(), "att-1");
    }

    #[test]
    fn test_status_changed_requires_statuses() {
        let result = TimelinePayload::from_columns(
            TimelineEventKind::StatusChanged,
            None,
            Some(TicketStatus::Completed),
            None,
            None,
        );
        assert!(matches!(result, Err(DomainError::DataIntegrity(_))));
    }

    #[test]
    fn test_fingerprint_ignores_recipient_case() {
        let a = message_fingerprint("Hi", &["Ops@Example.com".to_string()], "body");
        let b = message_fingerprint("Hi", &["ops@example.com".to_string()], "body");
        let c = message_fingerprint("Hi", &["ops@example.com".to_string()], "other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_query_prefers_id_cursor_and_clamps_limit() {
        let since = Utc::now();
        let query = TimelineQuery::new(Some(10), Some(since), Some(10_000));
        assert_eq!(query.since_id, Some(10));
        assert_eq!(query.since, None);
        assert_eq!(query.limit, MAX_PAGE_SIZE);

        let query = TimelineQuery::new(None, Some(since), None);
        assert_eq!(query.since, Some(since));
        assert_eq!(query.limit, DEFAULT_PAGE_SIZE);

        assert_eq!(TimelineQuery::new(None, None, Some(0)).limit, 1);
    }

    #[test]
    fn test_implied_roles() {
        assert_eq!(
            ActorRole::implied_by(TimelineEventKind::TicketSent),
            ActorRole::Support
        );
        assert_eq!(
            ActorRole::implied_by(TimelineEventKind::Created),
            ActorRole::Requester
        );
    }
}
