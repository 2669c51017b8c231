use crate::domain::entities::{
    AttachmentDirection, AttachmentRecord, NewTimelineEvent, OutboundMessage, TimelineEvent,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::AttachmentRepository;
use crate::infrastructure::persistence::timeline::insert_event;
use crate::infrastructure::persistence::{decode_ts, encode_ts, nullable, Database};
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Row};

const ATTACHMENT_COLUMNS: &str = "id, ticket_id, filename, mime_type, size_bytes, direction, \
     storage_key, outbound_message_id, uploaded_at, uploaded_by";

async fn insert_attachment(
    conn: &mut AnyConnection,
    attachment: &AttachmentRecord,
) -> DomainResult<()> {
    sqlx::query(
        "INSERT INTO attachments
            (id, ticket_id, filename, mime_type, size_bytes, direction, storage_key,
             outbound_message_id, uploaded_at, uploaded_by)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&attachment.id)
    .bind(attachment.ticket_id)
    .bind(&attachment.filename)
    .bind(&attachment.mime_type)
    .bind(attachment.size_bytes)
    .bind(attachment.direction.to_string())
    .bind(&attachment.storage_key)
    .bind(&attachment.outbound_message_id)
    .bind(encode_ts(attachment.uploaded_at))
    .bind(attachment.uploaded_by)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn row_to_attachment(row: &AnyRow) -> DomainResult<AttachmentRecord> {
    Ok(AttachmentRecord {
        id: row.try_get("id")?,
        ticket_id: row.try_get("ticket_id")?,
        filename: row.try_get("filename")?,
        mime_type: row.try_get("mime_type")?,
        size_bytes: row.try_get("size_bytes")?,
        direction: row
            .try_get::<String, _>("direction")?
            .parse::<AttachmentDirection>()
            .map_err(DomainError::DataIntegrity)?,
        storage_key: row.try_get("storage_key")?,
        outbound_message_id: nullable(row, "outbound_message_id")?,
        uploaded_at: decode_ts(&row.try_get::<String, _>("uploaded_at")?)?,
        uploaded_by: nullable(row, "uploaded_by")?,
    })
}

fn row_to_outbound(row: &AnyRow) -> DomainResult<OutboundMessage> {
    let id: String = row.try_get("id")?;
    let recipients: Vec<String> = serde_json::from_str(&row.try_get::<String, _>("recipients")?)
        .map_err(|e| {
            DomainError::DataIntegrity(format!("outbound message {}: invalid recipients: {}", id, e))
        })?;

    Ok(OutboundMessage {
        ticket_id: row.try_get("ticket_id")?,
        subject: row.try_get("subject")?,
        recipients,
        text_body: row.try_get("text_body")?,
        fingerprint: row.try_get("fingerprint")?,
        sent_at: decode_ts(&row.try_get::<String, _>("sent_at")?)?,
        sent_by: nullable(row, "sent_by")?,
        id,
    })
}

#[async_trait::async_trait]
impl AttachmentRepository for Database {
    async fn record_received_attachment(
        &self,
        attachment: &AttachmentRecord,
        event: &NewTimelineEvent,
    ) -> DomainResult<TimelineEvent> {
        let mut tx = self.pool.begin().await?;
        insert_attachment(&mut tx, attachment).await?;
        let event = insert_event(&mut tx, event).await?;
        tx.commit().await?;
        Ok(event)
    }

    async fn record_outbound_message(
        &self,
        message: &OutboundMessage,
        attachments: &[AttachmentRecord],
        events: &[NewTimelineEvent],
    ) -> DomainResult<Vec<TimelineEvent>> {
        let recipients = serde_json::to_string(&message.recipients)
            .map_err(|e| DomainError::Validation(format!("Invalid recipients: {}", e)))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO outbound_messages
                (id, ticket_id, subject, recipients, text_body, fingerprint, sent_at, sent_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(message.ticket_id)
        .bind(&message.subject)
        .bind(recipients)
        .bind(&message.text_body)
        .bind(&message.fingerprint)
        .bind(encode_ts(message.sent_at))
        .bind(message.sent_by)
        .execute(&mut *tx)
        .await?;

        for attachment in attachments {
            insert_attachment(&mut tx, attachment).await?;
        }

        let mut recorded = Vec::with_capacity(events.len());
        for event in events {
            recorded.push(insert_event(&mut tx, event).await?);
        }

        tx.commit().await?;
        Ok(recorded)
    }

    async fn get_attachment(&self, id: &str) -> DomainResult<Option<AttachmentRecord>> {
        let sql = format!("SELECT {} FROM attachments WHERE id = ?", ATTACHMENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_attachment).transpose()
    }

    async fn list_attachments(&self) -> DomainResult<Vec<AttachmentRecord>> {
        let sql = format!(
            "SELECT {} FROM attachments ORDER BY uploaded_at ASC, id ASC",
            ATTACHMENT_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_attachment).collect()
    }

    async fn list_outbound_messages(&self) -> DomainResult<Vec<OutboundMessage>> {
        let rows = sqlx::query(
            "SELECT id, ticket_id, subject, recipients, text_body, fingerprint, sent_at, sent_by
             FROM outbound_messages
             ORDER BY sent_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_outbound).collect()
    }
}
