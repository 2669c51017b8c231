use crate::domain::entities::Notification;
use crate::domain::ports::Notifier;

/// Logs deliveries instead of sending them. Used when SMTP is not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> bool {
        tracing::info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            attachments = notification.attachments.len(),
            "SMTP not configured, logging outbound message"
        );
        true
    }
}
