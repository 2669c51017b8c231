use crate::domain::entities::Notification;
use async_trait::async_trait;
use std::sync::Mutex;

/// Outbound message delivery. Only the success signal matters to callers.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> bool;
}

/// Records deliveries instead of sending them. Recipients listed in
/// `failing` report failure.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: Vec<String>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(recipients: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: recipients.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> bool {
        if self.failing.contains(&notification.recipient) {
            return false;
        }
        match self.sent.lock() {
            Ok(mut sent) => {
                sent.push(notification.clone());
                true
            }
            Err(_) => false,
        }
    }
}
