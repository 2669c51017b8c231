use crate::domain::entities::{
    generate_code, generate_protocol, ActorId, NewTicket, NewTimelineEvent, Notification,
    SlaOutcome, StatusLabels, Ticket, TicketAction, TicketDraft, TicketId, TicketStatus,
    TimelineEvent, TimelinePayload,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{
    ActorRepository, AttachmentStore, Clock, Notifier, TicketRepository, TransitionRecord,
};
use crate::infrastructure::observability::{NOTIFICATIONS_METRIC, TRANSITIONS_METRIC};
use crate::services::correspondence_service::html_from_text;
use crate::domain::services::sla_calculator;
use crate::services::sla_config::SlaConfigHolder;
use crate::services::timeline_hub::TimelineFeed;
use std::sync::Arc;
use tracing::{info, warn};

const CREATE_ATTEMPTS: usize = 3;

/// A committed state change and the event that records it.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub ticket: Ticket,
    pub event: TimelineEvent,
}

/// Ticket lifecycle: creation and the assume / complete / cancel transitions.
#[derive(Clone)]
pub struct TicketService {
    tickets: Arc<dyn TicketRepository>,
    sla_config: Arc<SlaConfigHolder>,
    feed: TimelineFeed,
    clock: Arc<dyn Clock>,
    labels: Arc<StatusLabels>,
    notifier: Arc<dyn Notifier>,
    actors: Arc<dyn ActorRepository>,
    store: Arc<dyn AttachmentStore>,
}

impl TicketService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        sla_config: Arc<SlaConfigHolder>,
        feed: TimelineFeed,
        clock: Arc<dyn Clock>,
        labels: Arc<StatusLabels>,
        notifier: Arc<dyn Notifier>,
        actors: Arc<dyn ActorRepository>,
        store: Arc<dyn AttachmentStore>,
    ) -> Self {
        Self {
            tickets,
            sla_config,
            feed,
            clock,
            labels,
            notifier,
            actors,
            store,
        }
    }

    pub fn labels(&self) -> &StatusLabels {
        &self.labels
    }

    /// Open a new ticket. The priority must have a configured SLA limit.
    pub async fn create(&self, request: NewTicket) -> DomainResult<Ticket> {
        request.validate()?;
        self.sla_config.snapshot().limit_for(&request.priority)?;

        let opened_at = self.clock.now();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let draft = TicketDraft {
                code: generate_code(),
                protocol: generate_protocol(opened_at),
                priority: request.priority.clone(),
                category: request.category.trim().to_string(),
                requester_name: request.requester_name.trim().to_string(),
                requester_email: request.requester_email.trim().to_string(),
                description: request.description.clone(),
                opened_at,
                opened_by: request.opened_by,
            };
            let description = format!(
                "Ticket {} opened by {} ({})",
                draft.code,
                draft.requester_name,
                self.labels.label(TicketStatus::Open)
            );

            match self.tickets.insert_ticket(&draft, &description).await {
                Ok((ticket, event)) => {
                    info!("Created ticket {} ({}) with priority {}", ticket.id, ticket.code, ticket.priority);
                    metrics::counter!(TRANSITIONS_METRIC, "action" => "create")
                        .increment(1);
                    self.feed.publish(event).await;
                    return Ok(ticket);
                }
                // Random code or protocol collided with an existing ticket
                Err(DomainError::StoreUnavailable(msg))
                    if msg.contains("UNIQUE") && attempt < CREATE_ATTEMPTS =>
                {
                    tracing::warn!("Ticket identifier collision, retrying: {}", msg);
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn get(&self, id: TicketId) -> DomainResult<Ticket> {
        self.tickets
            .get_ticket(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Ticket {} not found", id)))
    }

    pub async fn list(
        &self,
        status: Option<TicketStatus>,
        limit: i64,
        offset: i64,
    ) -> DomainResult<Vec<Ticket>> {
        let rows = self
            .tickets
            .list_ticket_page(status, limit.clamp(1, 500), offset.max(0))
            .await?;

        // Inconsistent rows stay visible to `reconcile` but not to listings
        let mut tickets = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match row.into_ticket() {
                Ok(ticket) => tickets.push(ticket),
                Err(e) => warn!("Leaving ticket {} out of the listing: {}", id, e),
            }
        }
        Ok(tickets)
    }

    pub async fn assume(&self, id: TicketId, actor: ActorId) -> DomainResult<TransitionOutcome> {
        self.transition(id, TicketAction::Assume, actor).await
    }

    /// Complete a ticket and record its SLA outcome on the event. A priority
    /// without a configured limit aborts the transition.
    pub async fn complete(&self, id: TicketId, actor: ActorId) -> DomainResult<TransitionOutcome> {
        self.transition(id, TicketAction::Complete, actor).await
    }

    pub async fn cancel(&self, id: TicketId, actor: ActorId) -> DomainResult<TransitionOutcome> {
        self.transition(id, TicketAction::Cancel, actor).await
    }

    /// Delete the ticket with its timeline and attachments. Stored files are
    /// removed after the rows; a file that cannot be removed is only logged.
    pub async fn delete(&self, id: TicketId) -> DomainResult<()> {
        let Some(storage_keys) = self.tickets.delete_ticket(id).await? else {
            return Err(DomainError::NotFound(format!("Ticket {} not found", id)));
        };
        info!("Deleted ticket {} and its timeline", id);

        for key in &storage_keys {
            if let Err(e) = self.store.delete(key).await {
                warn!("Attachment file {} of deleted ticket {} was left behind: {}", key, id, e);
            }
        }
        Ok(())
    }

    async fn transition(
        &self,
        id: TicketId,
        action: TicketAction,
        actor: ActorId,
    ) -> DomainResult<TransitionOutcome> {
        let ticket = self.get(id).await?;
        let now = self.clock.now();
        let before = ticket.status();
        let next = ticket.state.transition(action, now, actor)?;

        let mut updated = ticket;
        updated.state = next;

        let sla = match action {
            TicketAction::Complete => {
                let config = self.sla_config.snapshot();
                let evaluation = sla_calculator::evaluate(&updated, &config, now)?;
                Some(SlaOutcome::from(&evaluation))
            }
            TicketAction::Assume | TicketAction::Cancel => None,
        };

        let after = next.status();
        let record = TransitionRecord {
            ticket_id: id,
            action,
            expected: before,
            next,
            event: NewTimelineEvent {
                ticket_id: id,
                actor_id: Some(actor),
                description: format!(
                    "Status changed from {} to {}",
                    self.labels.label(before),
                    self.labels.label(after)
                ),
                payload: TimelinePayload::StatusChanged { before, after, sla },
                created_at: now,
            },
        };

        let event = self.tickets.apply_transition(&record).await?;

        info!("Ticket {} {}: {} -> {} by actor {}", id, action, before, after, actor);
        metrics::counter!(TRANSITIONS_METRIC, "action" => action.to_string())
            .increment(1);

        self.feed.publish(event.clone()).await;
        if action == TicketAction::Assume {
            self.notify_assignment(&updated, actor).await;
        }
        Ok(TransitionOutcome {
            ticket: updated,
            event,
        })
    }

    /// Tell the requester who picked the ticket up. Runs after the commit and
    /// never fails the transition.
    async fn notify_assignment(&self, ticket: &Ticket, technician: ActorId) {
        let name = match self.actors.get_actor(technician).await {
            Ok(Some(actor)) => actor.name,
            Ok(None) => "A support technician".to_string(),
            Err(e) => {
                warn!("Actor lookup for assignment notice of ticket {} failed: {}", ticket.id, e);
                "A support technician".to_string()
            }
        };
        let notification =
            assignment_notification(ticket, &name, self.labels.label(ticket.status()));
        let sent = self.notifier.notify(&notification).await;
        metrics::counter!(
            NOTIFICATIONS_METRIC,
            "kind" => "assignment",
            "outcome" => if sent { "sent" } else { "failed" }
        )
        .increment(1);
        if sent {
            info!("Assignment notice for ticket {} sent to {}", ticket.id, notification.recipient);
        } else {
            warn!(
                "Assignment notice for ticket {} to {} was not delivered",
                ticket.id, notification.recipient
            );
        }
    }
}

fn assignment_notification(
    ticket: &Ticket,
    technician: &str,
    status_label: &str,
) -> Notification {
    let text = format!(
        "Hello {},\n\n\
         {} has taken your ticket and is working on it.\n\n\
         Code: {}\n\
         Protocol: {}\n\
         Category: {}\n\
         Priority: {}\n\
         Status: {}\n",
        ticket.requester_name,
        technician,
        ticket.code,
        ticket.protocol,
        ticket.category,
        ticket.priority,
        status_label,
    );
    Notification {
        recipient: ticket.requester_email.clone(),
        subject: format!("Ticket {} assigned to {}", ticket.code, technician),
        html_body: html_from_text(&text),
        text_body: text,
        attachments: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Pickup, TicketState};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_assignment_notice_addresses_the_requester() {
        let at = Utc.with_ymd_and_hms(2026, 1, 12, 9, 0, 0).unwrap();
        let ticket = Ticket {
            id: 7,
            code: "TCK-0007".to_string(),
            protocol: "P-0007".to_string(),
            priority: "High".to_string(),
            category: "Access <VPN>".to_string(),
            requester_name: "Ana Souza".to_string(),
            requester_email: "ana@example.com".to_string(),
            description: None,
            opened_at: at,
            state: TicketState::InProgress(Pickup { at, by: 10 }),
        };

        let notice = assignment_notification(&ticket, "Bruno Lima", "In progress");
        assert_eq!(notice.recipient, "ana@example.com");
        assert_eq!(notice.subject, "Ticket TCK-0007 assigned to Bruno Lima");
        assert!(notice.text_body.starts_with("Hello Ana Souza,"));
        assert!(notice.text_body.contains("Category: Access <VPN>\n"));
        assert!(notice.text_body.contains("Status: In progress\n"));
        assert!(notice.html_body.contains("Access &lt;VPN&gt;<br>"));
        assert!(notice.attachments.is_empty());
    }
}
