use crate::domain::entities::{
    ActorId, AttachmentDirection, AttachmentRecord, FileUpload, NewTimelineEvent, TicketId,
    TimelinePayload, MAX_ATTACHMENT_SIZE,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{AttachmentRepository, AttachmentStore, Clock, TicketRepository};
use crate::services::timeline_hub::TimelineFeed;
use std::sync::Arc;

/// Replace path separators and control characters in a client-supplied name
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

pub fn validate_upload(upload: &FileUpload) -> DomainResult<String> {
    if upload.bytes.len() > MAX_ATTACHMENT_SIZE {
        return Err(DomainError::Validation(format!(
            "Attachment size exceeds maximum allowed size of {} MB",
            MAX_ATTACHMENT_SIZE / (1024 * 1024)
        )));
    }
    let filename = sanitize_filename(&upload.filename);
    if filename.is_empty() {
        return Err(DomainError::Validation("Attachment filename is required".to_string()));
    }
    Ok(filename)
}

/// Intake of requester files and download of stored attachments.
#[derive(Clone)]
pub struct AttachmentService {
    tickets: Arc<dyn TicketRepository>,
    attachments: Arc<dyn AttachmentRepository>,
    store: Arc<dyn AttachmentStore>,
    feed: TimelineFeed,
    clock: Arc<dyn Clock>,
}

impl AttachmentService {
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        attachments: Arc<dyn AttachmentRepository>,
        store: Arc<dyn AttachmentStore>,
        feed: TimelineFeed,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tickets,
            attachments,
            store,
            feed,
            clock,
        }
    }

    /// Store a requester file and record it on the ticket's timeline.
    pub async fn receive_attachment(
        &self,
        ticket_id: TicketId,
        actor: Option<ActorId>,
        upload: FileUpload,
    ) -> DomainResult<AttachmentRecord> {
        let filename = validate_upload(&upload)?;
        if !self.tickets.ticket_exists(ticket_id).await? {
            return Err(DomainError::NotFound(format!("Ticket {} not found", ticket_id)));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let record = AttachmentRecord {
            storage_key: format!("{}/{}", ticket_id, id),
            id,
            ticket_id,
            filename,
            mime_type: normalize_mime(&upload.mime_type),
            size_bytes: upload.bytes.len() as i64,
            direction: AttachmentDirection::Received,
            outbound_message_id: None,
            uploaded_at: self.clock.now(),
            uploaded_by: actor,
        };

        self.store.put(&record.storage_key, &upload.bytes).await?;

        let event = NewTimelineEvent {
            ticket_id,
            actor_id: actor,
            description: format!("Attachment received: {}", record.filename),
            payload: TimelinePayload::AttachmentReceived {
                attachment: record.to_ref(),
            },
            created_at: record.uploaded_at,
        };

        let event = match self.attachments.record_received_attachment(&record, &event).await {
            Ok(event) => event,
            Err(e) => {
                // Do not leave orphaned bytes behind
                if let Err(cleanup) = self.store.delete(&record.storage_key).await {
                    tracing::warn!("Failed to remove orphaned attachment {}: {}", record.id, cleanup);
                }
                return Err(e);
            }
        };

        tracing::info!(
            "Attachment {} ({} bytes) received on ticket {}",
            record.id,
            record.size_bytes,
            ticket_id
        );
        self.feed.publish(event).await;
        Ok(record)
    }

    /// Metadata and bytes of a stored attachment.
    pub async fn download(&self, id: &str) -> DomainResult<(AttachmentRecord, Vec<u8>)> {
        let record = self
            .attachments
            .get_attachment(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Attachment {} not found", id)))?;
        let bytes = self.store.fetch(&record.storage_key).await?;
        Ok((record, bytes))
    }
}

pub(crate) fn normalize_mime(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.contains('/') {
        "application/octet-stream".to_string()
    } else {
        trimmed.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("report 2026.pdf"), "report 2026.pdf");
        assert_eq!(sanitize_filename("a:b*c?.txt"), "a_b_c_.txt");
        assert_eq!(sanitize_filename("  "), "");
    }

    #[test]
    fn test_validate_upload_limits() {
        let upload = FileUpload {
            filename: "big.bin".to_string(),
            mime_type: "application/octet-stream".to_string(),
            bytes: vec![0; MAX_ATTACHMENT_SIZE + 1],
        };
        assert!(matches!(validate_upload(&upload), Err(DomainError::Validation(_))));

        let unnamed = FileUpload {
            filename: "".to_string(),
            mime_type: "text/plain".to_string(),
            bytes: b"hi".to_vec(),
        };
        assert!(validate_upload(&unnamed).is_err());
    }

    #[test]
    fn test_normalize_mime() {
        assert_eq!(normalize_mime("Image/PNG"), "image/png");
        assert_eq!(normalize_mime(""), "application/octet-stream");
        assert_eq!(normalize_mime("garbage"), "application/octet-stream");
    }
}
