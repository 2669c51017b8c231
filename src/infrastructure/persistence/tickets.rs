use crate::domain::entities::{
    ActorId, NewTimelineEvent, Ticket, TicketDraft, TicketId, TicketRow, TicketState,
    TicketStatus, TimelineEvent, TimelinePayload,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{TicketRepository, TransitionRecord};
use crate::infrastructure::persistence::timeline::insert_event;
use crate::infrastructure::persistence::{decode_opt_ts, decode_ts, encode_ts, nullable, Database};
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;

const TICKET_COLUMNS: &str = "id, code, protocol, priority, category, requester_name, \
     requester_email, description, status, opened_at, assumed_at, assumed_by, \
     completed_at, completed_by, cancelled_at, cancelled_by";

fn row_to_ticket_row(row: &AnyRow) -> DomainResult<TicketRow> {
    Ok(TicketRow {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        protocol: row.try_get("protocol")?,
        priority: row.try_get("priority")?,
        category: row.try_get("category")?,
        requester_name: row.try_get("requester_name")?,
        requester_email: row.try_get("requester_email")?,
        description: nullable(row, "description")?,
        status: row.try_get("status")?,
        opened_at: decode_ts(&row.try_get::<String, _>("opened_at")?)?,
        assumed_at: decode_opt_ts(nullable(row, "assumed_at")?)?,
        assumed_by: nullable(row, "assumed_by")?,
        completed_at: decode_opt_ts(nullable(row, "completed_at")?)?,
        completed_by: nullable(row, "completed_by")?,
        cancelled_at: decode_opt_ts(nullable(row, "cancelled_at")?)?,
        cancelled_by: nullable(row, "cancelled_by")?,
    })
}

/// Column values for the three nullable markers of a state.
fn marker_columns(
    state: &TicketState,
) -> [(Option<String>, Option<ActorId>); 3] {
    let pickup = state.pickup().map(|p| (p.at, p.by));
    let completed = state.completed().map(|r| (r.at, r.by));
    let cancelled = state.cancelled().map(|r| (r.at, r.by));
    [pickup, completed, cancelled]
        .map(|marker| (marker.map(|(at, _)| encode_ts(at)), marker.map(|(_, by)| by)))
}

#[async_trait::async_trait]
impl TicketRepository for Database {
    async fn insert_ticket(
        &self,
        draft: &TicketDraft,
        description: &str,
    ) -> DomainResult<(Ticket, TimelineEvent)> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "INSERT INTO tickets
                (code, protocol, priority, category, requester_name, requester_email,
                 description, status, opened_at, opened_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&draft.code)
        .bind(&draft.protocol)
        .bind(&draft.priority)
        .bind(&draft.category)
        .bind(&draft.requester_name)
        .bind(&draft.requester_email)
        .bind(&draft.description)
        .bind(TicketStatus::Open.as_str())
        .bind(encode_ts(draft.opened_at))
        .bind(draft.opened_by)
        .fetch_one(&mut *tx)
        .await?;
        let id: TicketId = row.try_get("id")?;

        let event = insert_event(
            &mut tx,
            &NewTimelineEvent {
                ticket_id: id,
                actor_id: draft.opened_by,
                description: description.to_string(),
                payload: TimelinePayload::Created {
                    status: TicketStatus::Open,
                },
                created_at: draft.opened_at,
            },
        )
        .await?;

        tx.commit().await?;

        let ticket = Ticket {
            id,
            code: draft.code.clone(),
            protocol: draft.protocol.clone(),
            priority: draft.priority.clone(),
            category: draft.category.clone(),
            requester_name: draft.requester_name.clone(),
            requester_email: draft.requester_email.clone(),
            description: draft.description.clone(),
            opened_at: draft.opened_at,
            state: TicketState::Open,
        };
        Ok((ticket, event))
    }

    async fn get_ticket(&self, id: TicketId) -> DomainResult<Option<Ticket>> {
        let sql = format!("SELECT {} FROM tickets WHERE id = ?", TICKET_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row_to_ticket_row(&row)?.into_ticket()?)),
            None => Ok(None),
        }
    }

    async fn ticket_exists(&self, id: TicketId) -> DomainResult<bool> {
        let row = sqlx::query("SELECT 1 AS found FROM tickets WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn list_ticket_page(
        &self,
        status: Option<TicketStatus>,
        limit: i64,
        offset: i64,
    ) -> DomainResult<Vec<TicketRow>> {
        let sql = format!(
            "SELECT {} FROM tickets
             WHERE (? IS NULL OR status = ?)
             ORDER BY opened_at DESC, id DESC
             LIMIT ? OFFSET ?",
            TICKET_COLUMNS
        );
        let status = status.map(|s| s.as_str());
        let rows = sqlx::query(&sql)
            .bind(status)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_ticket_row).collect()
    }

    async fn apply_transition(&self, transition: &TransitionRecord) -> DomainResult<TimelineEvent> {
        let mut tx = self.pool.begin().await?;

        let [assumed, completed, cancelled] = marker_columns(&transition.next);
        let result = sqlx::query(
            "UPDATE tickets
             SET status = ?, assumed_at = ?, assumed_by = ?, completed_at = ?, completed_by = ?,
                 cancelled_at = ?, cancelled_by = ?
             WHERE id = ? AND status = ?",
        )
        .bind(transition.next.status().as_str())
        .bind(assumed.0)
        .bind(assumed.1)
        .bind(completed.0)
        .bind(completed.1)
        .bind(cancelled.0)
        .bind(cancelled.1)
        .bind(transition.ticket_id)
        .bind(transition.expected.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Lost the compare-and-set; report what the ticket is now
            let current = sqlx::query("SELECT status FROM tickets WHERE id = ?")
                .bind(transition.ticket_id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;

            return match current {
                None => Err(DomainError::NotFound(format!(
                    "Ticket {} not found",
                    transition.ticket_id
                ))),
                Some(row) => {
                    let from = row
                        .try_get::<String, _>("status")?
                        .parse::<TicketStatus>()
                        .map_err(DomainError::DataIntegrity)?;
                    Err(DomainError::InvalidTransition {
                        from,
                        action: transition.action,
                    })
                }
            };
        }

        let event = insert_event(&mut tx, &transition.event).await?;
        tx.commit().await?;
        Ok(event)
    }

    async fn delete_ticket(&self, id: TicketId) -> DomainResult<Option<Vec<String>>> {
        let mut tx = self.pool.begin().await?;

        let storage_keys: Vec<String> =
            sqlx::query_scalar("SELECT storage_key FROM attachments WHERE ticket_id = ?")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM timeline_events WHERE ticket_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM attachments WHERE ticket_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM outbound_messages WHERE ticket_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM tickets WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }
        tx.commit().await?;
        Ok(Some(storage_keys))
    }

    async fn list_ticket_rows(&self) -> DomainResult<Vec<TicketRow>> {
        let sql = format!("SELECT {} FROM tickets ORDER BY id ASC", TICKET_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_ticket_row).collect()
    }

    async fn restore_terminal_marker(
        &self,
        id: TicketId,
        status: TicketStatus,
        at: DateTime<Utc>,
        by: ActorId,
    ) -> DomainResult<bool> {
        let sql = match status {
            TicketStatus::InProgress => {
                "UPDATE tickets SET assumed_at = ?, assumed_by = ?
                 WHERE id = ? AND status = 'in_progress' AND assumed_at IS NULL"
            }
            TicketStatus::Completed => {
                "UPDATE tickets SET completed_at = ?, completed_by = ?
                 WHERE id = ? AND status = 'completed' AND completed_at IS NULL"
            }
            TicketStatus::Cancelled => {
                "UPDATE tickets SET cancelled_at = ?, cancelled_by = ?
                 WHERE id = ? AND status = 'cancelled' AND cancelled_at IS NULL"
            }
            TicketStatus::Open => {
                return Err(DomainError::Validation(
                    "Open tickets carry no marker to restore".to_string(),
                ))
            }
        };

        let result = sqlx::query(sql)
            .bind(encode_ts(at))
            .bind(by)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
