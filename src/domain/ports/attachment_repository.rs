use crate::domain::entities::{AttachmentRecord, NewTimelineEvent, OutboundMessage, TimelineEvent};
use crate::domain::errors::DomainResult;

#[async_trait::async_trait]
pub trait AttachmentRepository: Send + Sync {
    /// Store the attachment row and its `attachment_received` event together.
    async fn record_received_attachment(
        &self,
        attachment: &AttachmentRecord,
        event: &NewTimelineEvent,
    ) -> DomainResult<TimelineEvent>;

    /// Store a delivered message, its attachments and their events together.
    async fn record_outbound_message(
        &self,
        message: &OutboundMessage,
        attachments: &[AttachmentRecord],
        events: &[NewTimelineEvent],
    ) -> DomainResult<Vec<TimelineEvent>>;

    async fn get_attachment(&self, id: &str) -> DomainResult<Option<AttachmentRecord>>;

    async fn list_attachments(&self) -> DomainResult<Vec<AttachmentRecord>>;

    async fn list_outbound_messages(&self) -> DomainResult<Vec<OutboundMessage>>;
}
