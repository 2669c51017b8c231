use crate::domain::entities::{
    Actor, ActorRole, NewTimelineEvent, PageSummary, TicketId, TicketStatus, TimelineEntry,
    TimelineEvent, TimelineEventKind, TimelinePayload, TimelineQuery,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::TimelineRepository;
use crate::infrastructure::persistence::{decode_opt_ts, decode_ts, encode_ts, nullable, Database};
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Row};

const EVENT_COLUMNS: &str = "e.id, e.ticket_id, e.kind, e.actor_id, e.description, \
     e.status_before, e.status_after, e.attachment_id, e.metadata, e.created_at";

/// Insert one event on an open connection or transaction.
pub(crate) async fn insert_event(
    conn: &mut AnyConnection,
    event: &NewTimelineEvent,
) -> DomainResult<TimelineEvent> {
    let (before, after) = event.payload.status_change();
    let metadata = event
        .payload
        .metadata()?
        .map(|value| value.to_string());

    let row = sqlx::query(
        "INSERT INTO timeline_events
            (ticket_id, kind, natural_key, actor_id, description, status_before, status_after,
             attachment_id, metadata, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(event.ticket_id)
    .bind(event.payload.kind().as_str())
    .bind(event.payload.natural_key())
    .bind(event.actor_id)
    .bind(&event.description)
    .bind(before.map(|s| s.as_str()))
    .bind(after.map(|s| s.as_str()))
    .bind(event.payload.attachment().map(|a| a.id.clone()))
    .bind(metadata)
    .bind(encode_ts(event.created_at))
    .fetch_one(&mut *conn)
    .await?;

    let id: i64 = row.try_get("id")?;
    Ok(event.clone().into_event(id))
}

fn parse_status(value: Option<String>) -> DomainResult<Option<TicketStatus>> {
    value
        .map(|s| s.parse::<TicketStatus>().map_err(DomainError::DataIntegrity))
        .transpose()
}

fn event_from_row(row: &AnyRow) -> DomainResult<TimelineEvent> {
    let id: i64 = row.try_get("id")?;
    let kind: TimelineEventKind = row
        .try_get::<String, _>("kind")?
        .parse()
        .map_err(|e: String| DomainError::DataIntegrity(format!("event {}: {}", id, e)))?;
    let metadata = match nullable::<String>(row, "metadata")? {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
            DomainError::DataIntegrity(format!("event {}: invalid metadata: {}", id, e))
        })?),
        None => None,
    };

    let payload = TimelinePayload::from_columns(
        kind,
        parse_status(nullable(row, "status_before")?)?,
        parse_status(nullable(row, "status_after")?)?,
        nullable(row, "attachment_id")?,
        metadata,
    )?;

    Ok(TimelineEvent {
        id,
        ticket_id: row.try_get("ticket_id")?,
        actor_id: nullable(row, "actor_id")?,
        description: row.try_get("description")?,
        payload,
        created_at: decode_ts(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn entry_from_row(row: &AnyRow) -> DomainResult<TimelineEntry> {
    let event = event_from_row(row)?;
    let name: Option<String> = nullable(row, "actor_name")?;
    let role: Option<String> = nullable(row, "actor_role")?;
    let actor = match (event.actor_id, name, role) {
        (Some(id), Some(name), Some(role)) => Some(Actor {
            id,
            name,
            role: role.parse::<ActorRole>().map_err(DomainError::DataIntegrity)?,
        }),
        _ => None,
    };
    Ok(TimelineEntry { event, actor })
}

#[async_trait::async_trait]
impl TimelineRepository for Database {
    async fn append_event(&self, event: &NewTimelineEvent) -> DomainResult<TimelineEvent> {
        let mut conn = self.pool.acquire().await?;
        insert_event(&mut conn, event).await
    }

    async fn append_event_if_absent(
        &self,
        event: &NewTimelineEvent,
    ) -> DomainResult<Option<TimelineEvent>> {
        let (before, after) = event.payload.status_change();
        let kind = event.payload.kind().as_str();
        let natural_key = event.payload.natural_key();
        let metadata = event
            .payload
            .metadata()?
            .map(|value| value.to_string());

        // Single statement: SQLite's writer lock makes the check and insert atomic
        let row = sqlx::query(
            "INSERT OR IGNORE INTO timeline_events
                (ticket_id, kind, natural_key, actor_id, description, status_before, status_after,
                 attachment_id, metadata, created_at)
             SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
             WHERE NOT EXISTS (
                SELECT 1 FROM timeline_events
                WHERE ticket_id = ? AND kind = ? AND natural_key = ?
             )
             RETURNING id",
        )
        .bind(event.ticket_id)
        .bind(kind)
        .bind(&natural_key)
        .bind(event.actor_id)
        .bind(&event.description)
        .bind(before.map(|s| s.as_str()))
        .bind(after.map(|s| s.as_str()))
        .bind(event.payload.attachment().map(|a| a.id.clone()))
        .bind(metadata)
        .bind(encode_ts(event.created_at))
        .bind(event.ticket_id)
        .bind(kind)
        .bind(&natural_key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let id: i64 = row.try_get("id")?;
                Ok(Some(event.clone().into_event(id)))
            }
            None => Ok(None),
        }
    }

    async fn query_events(
        &self,
        ticket_id: TicketId,
        query: &TimelineQuery,
    ) -> DomainResult<Vec<TimelineEntry>> {
        let since = query.since.map(encode_ts);
        let sql = format!(
            "SELECT {}, a.name AS actor_name, a.role AS actor_role
             FROM timeline_events e
             LEFT JOIN actors a ON a.id = e.actor_id
             WHERE e.ticket_id = ?
               AND (? IS NULL OR e.id > ?)
               AND (? IS NULL OR e.created_at > ?)
             ORDER BY e.id ASC
             LIMIT ?",
            EVENT_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(ticket_id)
            .bind(query.since_id)
            .bind(query.since_id)
            .bind(since.clone())
            .bind(since)
            .bind(query.limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn page_summary(
        &self,
        ticket_id: TicketId,
        query: &TimelineQuery,
    ) -> DomainResult<PageSummary> {
        let since = query.since.map(encode_ts);
        let row = sqlx::query(
            "SELECT COUNT(*) AS count, MAX(id) AS last_id, MAX(created_at) AS last_modified
             FROM (
                SELECT id, created_at FROM timeline_events
                WHERE ticket_id = ?
                  AND (? IS NULL OR id > ?)
                  AND (? IS NULL OR created_at > ?)
                ORDER BY id ASC
                LIMIT ?
             )",
        )
        .bind(ticket_id)
        .bind(query.since_id)
        .bind(query.since_id)
        .bind(since.clone())
        .bind(since)
        .bind(query.limit)
        .fetch_one(&self.pool)
        .await?;

        Ok(PageSummary {
            count: row.try_get("count")?,
            last_id: nullable::<i64>(&row, "last_id")?.unwrap_or(0),
            last_modified: decode_opt_ts(nullable(&row, "last_modified")?)?,
        })
    }

    async fn find_event(
        &self,
        ticket_id: TicketId,
        kind: TimelineEventKind,
        natural_key: &str,
    ) -> DomainResult<Option<TimelineEvent>> {
        let sql = format!(
            "SELECT {} FROM timeline_events e
             WHERE e.ticket_id = ? AND e.kind = ? AND e.natural_key = ?
             ORDER BY e.id ASC
             LIMIT 1",
            EVENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(ticket_id)
            .bind(kind.as_str())
            .bind(natural_key)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(event_from_row).transpose()
    }
}
