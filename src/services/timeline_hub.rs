use crate::domain::entities::{TicketId, TimelineEntry, TimelineEvent};
use crate::domain::ports::ActorRepository;
use crate::infrastructure::observability::LIVE_PUSHES_METRIC;
use crate::services::timeline_service::TimelineEventView;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio::sync::RwLock;

pub type ViewerId = u64;

/// An event pushed to a live viewer, tagged with its ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveEvent {
    pub ticket_id: TicketId,
    pub event: TimelineEventView,
}

#[derive(Default)]
struct HubState {
    viewers: HashMap<ViewerId, Sender<LiveEvent>>,
    groups: HashMap<TicketId, HashSet<ViewerId>>,
}

/// Groups live viewers by ticket and pushes new timeline events to them.
///
/// Delivery is best-effort: a viewer whose channel is full misses the event
/// and a viewer whose channel is closed is dropped. Clients catch up through
/// the sync endpoint.
pub struct TimelineHub {
    state: RwLock<HubState>,
    next_viewer: AtomicU64,
    capacity: usize,
}

impl TimelineHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: RwLock::new(HubState::default()),
            next_viewer: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    /// Register a viewer and return the receiving end of its channel
    pub async fn register(&self) -> (ViewerId, Receiver<LiveEvent>) {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.next_viewer.fetch_add(1, Ordering::Relaxed);
        self.state.write().await.viewers.insert(id, tx);
        tracing::debug!("Timeline viewer {} connected", id);
        (id, rx)
    }

    /// Returns false when the viewer is not registered
    pub async fn subscribe(&self, viewer: ViewerId, ticket_id: TicketId) -> bool {
        let mut state = self.state.write().await;
        if !state.viewers.contains_key(&viewer) {
            return false;
        }
        state.groups.entry(ticket_id).or_default().insert(viewer);
        true
    }

    pub async fn unsubscribe(&self, viewer: ViewerId, ticket_id: TicketId) {
        let mut state = self.state.write().await;
        if let Some(group) = state.groups.get_mut(&ticket_id) {
            group.remove(&viewer);
            if group.is_empty() {
                state.groups.remove(&ticket_id);
            }
        }
    }

    /// Forget a viewer and remove it from every group
    pub async fn drop_viewer(&self, viewer: ViewerId) {
        let mut state = self.state.write().await;
        Self::remove_viewer(&mut state, viewer);
        tracing::debug!("Timeline viewer {} disconnected", viewer);
    }

    pub async fn subscriber_count(&self, ticket_id: TicketId) -> usize {
        self.state
            .read()
            .await
            .groups
            .get(&ticket_id)
            .map(HashSet::len)
            .unwrap_or(0)
    }

    /// Push to every subscriber of the ticket. Returns how many viewers
    /// accepted the event.
    pub async fn publish(&self, ticket_id: TicketId, view: TimelineEventView) -> usize {
        let event_id = view.id;
        let live = LiveEvent {
            ticket_id,
            event: view,
        };
        let mut closed = Vec::new();
        let mut delivered = 0;
        {
            let state = self.state.read().await;
            let Some(group) = state.groups.get(&ticket_id) else {
                return 0;
            };
            for viewer in group {
                let Some(sender) = state.viewers.get(viewer) else {
                    continue;
                };
                match sender.try_send(live.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!("Timeline viewer {} is lagging, event {} skipped", viewer, event_id);
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*viewer),
                }
            }
        }

        if !closed.is_empty() {
            let mut state = self.state.write().await;
            for viewer in closed {
                Self::remove_viewer(&mut state, viewer);
            }
        }
        delivered
    }

    fn remove_viewer(state: &mut HubState, viewer: ViewerId) {
        state.viewers.remove(&viewer);
        state.groups.retain(|_, group| {
            group.remove(&viewer);
            !group.is_empty()
        });
    }
}

impl Default for TimelineHub {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Enriches freshly committed events with their actor and hands them to the hub.
#[derive(Clone)]
pub struct TimelineFeed {
    actors: Arc<dyn ActorRepository>,
    hub: Arc<TimelineHub>,
}

impl TimelineFeed {
    pub fn new(actors: Arc<dyn ActorRepository>, hub: Arc<TimelineHub>) -> Self {
        Self { actors, hub }
    }

    pub fn hub(&self) -> &Arc<TimelineHub> {
        &self.hub
    }

    /// Never fails: the event is already committed and push is advisory
    pub async fn publish(&self, event: TimelineEvent) {
        let actor = match event.actor_id {
            Some(id) => match self.actors.get_actor(id).await {
                Ok(actor) => actor,
                Err(e) => {
                    tracing::warn!("Actor lookup for live event {} failed: {}", event.id, e);
                    None
                }
            },
            None => None,
        };
        let ticket_id = event.ticket_id;
        let view = TimelineEventView::from(TimelineEntry { event, actor });
        let delivered = self.hub.publish(ticket_id, view).await;
        metrics::counter!(LIVE_PUSHES_METRIC).increment(delivered as u64);
        tracing::debug!("Pushed timeline event to {} viewers of ticket {}", delivered, ticket_id);
    }

    pub async fn publish_all(&self, events: Vec<TimelineEvent>) {
        for event in events {
            self.publish(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{TicketStatus, TimelinePayload};
    use chrono::Utc;

    fn view(id: i64, ticket_id: TicketId) -> TimelineEventView {
        TimelineEventView::from(TimelineEntry {
            event: TimelineEvent {
                id,
                ticket_id,
                actor_id: None,
                description: "Ticket opened".to_string(),
                payload: TimelinePayload::Created {
                    status: TicketStatus::Open,
                },
                created_at: Utc::now(),
            },
            actor: None,
        })
    }

    #[tokio::test]
    async fn test_publish_reaches_only_the_ticket_group() {
        let hub = TimelineHub::new(8);
        let (a, mut rx_a) = hub.register().await;
        let (b, mut rx_b) = hub.register().await;

        assert!(hub.subscribe(a, 1).await);
        assert!(hub.subscribe(b, 2).await);

        assert_eq!(hub.publish(1, view(10, 1)).await, 1);
        let pushed = rx_a.recv().await.unwrap();
        assert_eq!(pushed.ticket_id, 1);
        assert_eq!(pushed.event.id, 10);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_and_drop() {
        let hub = TimelineHub::new(8);
        let (a, _rx) = hub.register().await;
        hub.subscribe(a, 1).await;
        hub.subscribe(a, 2).await;

        hub.unsubscribe(a, 1).await;
        assert_eq!(hub.subscriber_count(1).await, 0);
        assert_eq!(hub.subscriber_count(2).await, 1);

        hub.drop_viewer(a).await;
        assert_eq!(hub.subscriber_count(2).await, 0);
        assert!(!hub.subscribe(a, 3).await);
    }

    #[tokio::test]
    async fn test_closed_viewers_are_pruned() {
        let hub = TimelineHub::new(8);
        let (a, rx) = hub.register().await;
        hub.subscribe(a, 5).await;
        drop(rx);

        assert_eq!(hub.publish(5, view(1, 5)).await, 0);
        assert_eq!(hub.subscriber_count(5).await, 0);
    }

    #[tokio::test]
    async fn test_full_channel_skips_without_blocking() {
        let hub = TimelineHub::new(1);
        let (a, mut rx) = hub.register().await;
        hub.subscribe(a, 5).await;

        assert_eq!(hub.publish(5, view(1, 5)).await, 1);
        assert_eq!(hub.publish(5, view(2, 5)).await, 0);
        assert_eq!(rx.recv().await.unwrap().event.id, 1);
        // Still subscribed after a skipped event
        assert_eq!(hub.subscriber_count(5).await, 1);
    }
}
