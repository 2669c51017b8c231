use crate::domain::entities::{
    ActorRole, AttachmentRef, PageSummary, TicketId, TicketStatus, TimelineEntry,
    TimelineEventKind, TimelineQuery,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{TicketRepository, TimelineRepository};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Wire shape of one timeline event, shared by the sync endpoint and live push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEventView {
    pub id: i64,
    pub kind: TimelineEventKind,
    pub actor_id: Option<i64>,
    pub actor_name: Option<String>,
    pub actor_role: ActorRole,
    pub description: String,
    pub status_before: Option<TicketStatus>,
    #[serde(rename = "statusNovo")]
    pub status_after: Option<TicketStatus>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentView {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub url: String,
}

impl From<&AttachmentRef> for AttachmentView {
    fn from(attachment: &AttachmentRef) -> Self {
        Self {
            id: attachment.id.clone(),
            filename: attachment.filename.clone(),
            mime_type: attachment.mime_type.clone(),
            size_bytes: attachment.size_bytes,
            url: format!("/api/attachments/{}/download", attachment.id),
        }
    }
}

impl From<TimelineEntry> for TimelineEventView {
    fn from(entry: TimelineEntry) -> Self {
        let actor_role = entry.actor_role();
        let TimelineEntry { event, actor } = entry;
        let (status_before, status_after) = event.payload.status_change();

        Self {
            id: event.id,
            kind: event.kind(),
            actor_id: event.actor_id,
            actor_name: actor.map(|a| a.name),
            actor_role,
            status_before,
            status_after,
            metadata: event.payload.metadata().ok().flatten(),
            attachment: event.payload.attachment().map(AttachmentView::from),
            description: event.description,
            created_at: event.created_at,
        }
    }
}

/// Validators sent by the client.
#[derive(Debug, Clone, Default)]
pub struct Preconditions {
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    NotModified {
        etag: String,
        last_modified: Option<DateTime<Utc>>,
    },
    Page {
        etag: String,
        last_modified: Option<DateTime<Utc>>,
        events: Vec<TimelineEventView>,
    },
}

/// Weak validator over the page identity: ticket, highest id, row count.
pub fn weak_etag(ticket_id: TicketId, summary: &PageSummary) -> String {
    let digest = Sha256::digest(format!("{}:{}:{}", ticket_id, summary.last_id, summary.count));
    format!("W/\"{}\"", hex::encode(digest))
}

/// IMF-fixdate as used by `Last-Modified`.
pub fn http_date(value: DateTime<Utc>) -> String {
    value.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Accepts RFC 3339, naive ISO 8601 (read as UTC) or `dd/mm/YYYY HH:MM:SS`.
pub fn parse_since(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%d/%m/%Y %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn etag_matches(header: &str, etag: &str) -> bool {
    let opaque = |tag: &str| tag.trim().trim_start_matches("W/").to_string();
    let wanted = opaque(etag);
    header
        .split(',')
        .any(|candidate| candidate.trim() == "*" || opaque(candidate) == wanted)
}

impl Preconditions {
    /// True when the client already holds this page.
    pub fn satisfied_by(&self, etag: &str, last_modified: Option<DateTime<Utc>>) -> bool {
        if let Some(header) = &self.if_none_match {
            // If-None-Match takes precedence over If-Modified-Since
            return etag_matches(header, etag);
        }
        match (self.if_modified_since, last_modified) {
            (Some(since), Some(last)) => last.timestamp() <= since.timestamp(),
            _ => false,
        }
    }
}

/// Incremental, cacheable reads of a ticket's timeline.
#[derive(Clone)]
pub struct TimelineService {
    tickets: Arc<dyn TicketRepository>,
    timeline: Arc<dyn TimelineRepository>,
}

impl TimelineService {
    pub fn new(tickets: Arc<dyn TicketRepository>, timeline: Arc<dyn TimelineRepository>) -> Self {
        Self { tickets, timeline }
    }

    /// Unknown tickets fail with `NotFound`; any other failure degrades to an
    /// empty page so polling viewers keep running.
    pub async fn sync(
        &self,
        ticket_id: TicketId,
        query: TimelineQuery,
        preconditions: &Preconditions,
    ) -> DomainResult<SyncOutcome> {
        match self.try_sync(ticket_id, query, preconditions).await {
            Ok(outcome) => Ok(outcome),
            Err(DomainError::NotFound(msg)) => Err(DomainError::NotFound(msg)),
            Err(e) => {
                tracing::error!("Timeline sync for ticket {} failed: {}", ticket_id, e);
                Ok(SyncOutcome::Page {
                    etag: weak_etag(ticket_id, &PageSummary::default()),
                    last_modified: None,
                    events: Vec::new(),
                })
            }
        }
    }

    async fn try_sync(
        &self,
        ticket_id: TicketId,
        query: TimelineQuery,
        preconditions: &Preconditions,
    ) -> DomainResult<SyncOutcome> {
        if !self.tickets.ticket_exists(ticket_id).await? {
            return Err(DomainError::NotFound(format!("Ticket {} not found", ticket_id)));
        }

        let summary = self.timeline.page_summary(ticket_id, &query).await?;
        let etag = weak_etag(ticket_id, &summary);

        if preconditions.satisfied_by(&etag, summary.last_modified) {
            tracing::debug!("Timeline for ticket {} not modified", ticket_id);
            return Ok(SyncOutcome::NotModified {
                etag,
                last_modified: summary.last_modified,
            });
        }

        let events = self
            .timeline
            .query_events(ticket_id, &query)
            .await?
            .into_iter()
            .map(TimelineEventView::from)
            .collect::<Vec<_>>();

        tracing::debug!(
            "Timeline for ticket {}: {} events after {:?}",
            ticket_id,
            events.len(),
            query.since_id
        );

        Ok(SyncOutcome::Page {
            etag,
            last_modified: summary.last_modified,
            events,
        })
    }
}
