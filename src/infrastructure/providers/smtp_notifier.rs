use crate::domain::entities::Notification;
use crate::domain::ports::Notifier;
use lettre::{
    message::{header::ContentType, Attachment, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message as LettreMessage, Tokio1Executor,
};

/// SMTP settings for outbound ticket mail.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub starttls: bool,
}

/// Sends ticket correspondence through an SMTP relay.
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpNotifier {
    pub fn new(settings: &SmtpSettings) -> Result<Self, String> {
        let builder = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                .map_err(|e| format!("Failed to create SMTP transport: {}", e))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };
        let builder = builder.port(settings.port);
        let builder = match (&settings.username, &settings.password) {
            (Some(user), Some(pass)) => {
                builder.credentials(Credentials::new(user.clone(), pass.clone()))
            }
            _ => builder,
        };

        Ok(Self {
            mailer: builder.build(),
            from: settings.from.clone(),
        })
    }

    fn build_message(&self, notification: &Notification) -> Result<LettreMessage, String> {
        let alternative = MultiPart::alternative()
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_PLAIN)
                    .body(notification.text_body.clone()),
            )
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(notification.html_body.clone()),
            );

        let mut body = MultiPart::mixed().multipart(alternative);
        for file in &notification.attachments {
            let content_type = ContentType::parse(&file.mime_type)
                .or_else(|_| ContentType::parse("application/octet-stream"))
                .map_err(|e| format!("Invalid content type: {}", e))?;
            body = body.singlepart(
                Attachment::new(file.filename.clone()).body(file.bytes.clone(), content_type),
            );
        }

        LettreMessage::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| format!("Invalid from address: {}", e))?,
            )
            .to(notification
                .recipient
                .parse()
                .map_err(|e| format!("Invalid to address: {}", e))?)
            .subject(&notification.subject)
            .multipart(body)
            .map_err(|e| format!("Failed to build email: {}", e))
    }
}

#[async_trait::async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, notification: &Notification) -> bool {
        let message = match self.build_message(notification) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Not sending to {}: {}", notification.recipient, e);
                return false;
            }
        };

        match self.mailer.send(message).await {
            Ok(_) => {
                tracing::info!(
                    "Email sent to {} ({} attachments)",
                    notification.recipient,
                    notification.attachments.len()
                );
                true
            }
            Err(e) => {
                tracing::error!("SMTP send to {} failed: {}", notification.recipient, e);
                false
            }
        }
    }
}
