use crate::domain::entities::{
    message_fingerprint, ActorId, AttachmentDirection, AttachmentRecord, FileUpload,
    NewTimelineEvent, Notification, OutboundMessage, TicketId, TimelinePayload,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{
    AttachmentRepository, AttachmentStore, Clock, Notifier, TicketRepository,
};
use crate::infrastructure::observability::NOTIFICATIONS_METRIC;
use crate::services::attachment_service::{normalize_mime, validate_upload};
use crate::services::timeline_hub::TimelineFeed;
use std::sync::Arc;

/// A ticket message composed by support.
#[derive(Debug, Clone, Default)]
pub struct OutboundTicket {
    pub recipients: Vec<String>,
    pub subject: String,
    pub html_body: Option<String>,
    pub text_body: String,
    /// New files to attach
    pub files: Vec<FileUpload>,
    /// Already stored attachments of the same ticket to forward
    pub attachment_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SentTicket {
    pub message: OutboundMessage,
    pub attachments: Vec<AttachmentRecord>,
    pub failed_recipients: Vec<String>,
}

pub(crate) fn html_from_text(text: &str) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!("<p>{}</p>", escaped.replace('\n', "<br>"))
}

#[derive(Clone)]
pub struct CorrespondenceService {
    tickets: Arc<dyn TicketRepository>,
    attachments: Arc<dyn AttachmentRepository>,
    store: Arc<dyn AttachmentStore>,
    notifier: Arc<dyn Notifier>,
    feed: TimelineFeed,
    clock: Arc<dyn Clock>,
}

impl CorrespondenceService {
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        attachments: Arc<dyn AttachmentRepository>,
        store: Arc<dyn AttachmentStore>,
        notifier: Arc<dyn Notifier>,
        feed: TimelineFeed,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tickets,
            attachments,
            store,
            notifier,
            feed,
            clock,
        }
    }

    /// Deliver a message to every recipient. Recorded on the timeline when at
    /// least one delivery succeeds; nothing is recorded otherwise.
    pub async fn send_ticket(
        &self,
        ticket_id: TicketId,
        actor: Option<ActorId>,
        outbound: OutboundTicket,
    ) -> DomainResult<SentTicket> {
        let recipients = validate_recipients(&outbound.recipients)?;
        if outbound.subject.trim().is_empty() {
            return Err(DomainError::Validation("Subject is required".to_string()));
        }
        if !self.tickets.ticket_exists(ticket_id).await? {
            return Err(DomainError::NotFound(format!("Ticket {} not found", ticket_id)));
        }

        let files = self.collect_files(ticket_id, &outbound).await?;
        let message_id = uuid::Uuid::new_v4().to_string();
        let sent_at = self.clock.now();

        let mut records = Vec::with_capacity(files.len());
        for file in &files {
            let filename = validate_upload(file)?;
            let id = uuid::Uuid::new_v4().to_string();
            records.push(AttachmentRecord {
                storage_key: format!("{}/{}", ticket_id, id),
                id,
                ticket_id,
                filename,
                mime_type: normalize_mime(&file.mime_type),
                size_bytes: file.bytes.len() as i64,
                direction: AttachmentDirection::Sent,
                outbound_message_id: Some(message_id.clone()),
                uploaded_at: sent_at,
                uploaded_by: actor,
            });
        }

        for (record, file) in records.iter().zip(&files) {
            if let Err(e) = self.store.put(&record.storage_key, &file.bytes).await {
                self.discard(&records).await;
                return Err(e);
            }
        }

        let html_body = outbound
            .html_body
            .clone()
            .unwrap_or_else(|| html_from_text(&outbound.text_body));
        let mut delivered = Vec::new();
        let mut failed = Vec::new();
        for recipient in recipients {
            let notification = Notification {
                recipient: recipient.clone(),
                subject: outbound.subject.clone(),
                html_body: html_body.clone(),
                text_body: outbound.text_body.clone(),
                attachments: files.clone(),
            };
            let sent = self.notifier.notify(&notification).await;
            metrics::counter!(
                NOTIFICATIONS_METRIC,
                "kind" => "ticket",
                "outcome" => if sent { "sent" } else { "failed" }
            )
            .increment(1);
            if sent {
                delivered.push(recipient);
            } else {
                tracing::warn!("Delivery of ticket {} to {} failed", ticket_id, recipient);
                failed.push(recipient);
            }
        }

        if delivered.is_empty() {
            self.discard(&records).await;
            return Err(DomainError::DeliveryFailed(format!(
                "No recipient accepted the message for ticket {}",
                ticket_id
            )));
        }

        let fingerprint = message_fingerprint(&outbound.subject, &delivered, &outbound.text_body);
        let message = OutboundMessage {
            id: message_id,
            ticket_id,
            subject: outbound.subject.clone(),
            recipients: delivered.clone(),
            text_body: outbound.text_body.clone(),
            fingerprint: fingerprint.clone(),
            sent_at,
            sent_by: actor,
        };

        let mut events = vec![NewTimelineEvent {
            ticket_id,
            actor_id: actor,
            description: format!("Email sent: {} to {}", message.subject, delivered.join(", ")),
            payload: TimelinePayload::TicketSent {
                subject: message.subject.clone(),
                recipients: delivered,
                fingerprint,
            },
            created_at: sent_at,
        }];
        events.extend(records.iter().map(|record| NewTimelineEvent {
            ticket_id,
            actor_id: actor,
            description: format!("Attachment sent: {}", record.filename),
            payload: TimelinePayload::AttachmentSent {
                attachment: record.to_ref(),
            },
            created_at: sent_at,
        }));

        let recorded = match self
            .attachments
            .record_outbound_message(&message, &records, &events)
            .await
        {
            Ok(recorded) => recorded,
            Err(e) => {
                tracing::error!(
                    "Message {} for ticket {} was delivered but could not be recorded: {}",
                    message.id,
                    ticket_id,
                    e
                );
                self.discard(&records).await;
                return Err(e);
            }
        };

        tracing::info!(
            "Ticket {} sent to {} recipients with {} attachments",
            ticket_id,
            message.recipients.len(),
            records.len()
        );
        self.feed.publish_all(recorded).await;

        Ok(SentTicket {
            message,
            attachments: records,
            failed_recipients: failed,
        })
    }

    async fn collect_files(
        &self,
        ticket_id: TicketId,
        outbound: &OutboundTicket,
    ) -> DomainResult<Vec<FileUpload>> {
        let mut files = outbound.files.clone();
        for id in &outbound.attachment_ids {
            let record = self
                .attachments
                .get_attachment(id)
                .await?
                .filter(|record| record.ticket_id == ticket_id)
                .ok_or_else(|| {
                    DomainError::Validation(format!(
                        "Attachment {} does not belong to ticket {}",
                        id, ticket_id
                    ))
                })?;
            files.push(FileUpload {
                bytes: self.store.fetch(&record.storage_key).await?,
                filename: record.filename,
                mime_type: record.mime_type,
            });
        }
        Ok(files)
    }

    async fn discard(&self, records: &[AttachmentRecord]) {
        for record in records {
            if let Err(e) = self.store.delete(&record.storage_key).await {
                tracing::warn!("Failed to remove unsent attachment {}: {}", record.id, e);
            }
        }
    }
}

fn validate_recipients(raw: &[String]) -> DomainResult<Vec<String>> {
    let mut recipients: Vec<String> = Vec::new();
    for recipient in raw.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
        if !email_address::EmailAddress::is_valid(recipient) {
            return Err(DomainError::Validation(format!(
                "Invalid recipient email: {}",
                recipient
            )));
        }
        if !recipients.iter().any(|r| r.eq_ignore_ascii_case(recipient)) {
            recipients.push(recipient.to_string());
        }
    }
    if recipients.is_empty() {
        return Err(DomainError::Validation(
            "At least one recipient is required".to_string(),
        ));
    }
    Ok(recipients)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipients_are_validated_and_deduplicated() {
        let recipients = validate_recipients(&[
            "ops@example.com".to_string(),
            " OPS@example.com ".to_string(),
            "".to_string(),
            "lead@example.com".to_string(),
        ])
        .unwrap();
        assert_eq!(recipients, vec!["ops@example.com", "lead@example.com"]);

        assert!(validate_recipients(&[]).is_err());
        assert!(validate_recipients(&["nope".to_string()]).is_err());
    }

    #[test]
    fn test_html_fallback_escapes_text() {
        assert_eq!(
            html_from_text("a < b\nthanks"),
            "<p>a &lt; b<br>thanks</p>"
        );
    }
}
