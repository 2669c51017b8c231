use crate::domain::entities::{
    AttachmentDirection, NewTimelineEvent, SlaOutcome, Ticket, TicketState, TicketStatus,
    TimelinePayload,
};
use crate::domain::errors::DomainResult;
use crate::domain::ports::{AttachmentRepository, TicketRepository, TimelineRepository};
use crate::domain::services::sla_calculator;
use crate::services::sla_config::SlaConfigHolder;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Counts of events inserted by one backfill run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub created: usize,
    pub status_changes: usize,
    pub attachments_received: usize,
    pub tickets_sent: usize,
    pub attachments_sent: usize,
    /// Tickets whose stored state could not be decoded
    pub skipped_tickets: usize,
}

impl BackfillReport {
    pub fn total(&self) -> usize {
        self.created
            + self.status_changes
            + self.attachments_received
            + self.tickets_sent
            + self.attachments_sent
    }
}

/// Rebuilds missing timeline events from tickets, attachments and sent
/// messages. Every insert is keyed by the fact's natural key, so running it
/// again inserts nothing.
#[derive(Clone)]
pub struct BackfillService {
    tickets: Arc<dyn TicketRepository>,
    timeline: Arc<dyn TimelineRepository>,
    attachments: Arc<dyn AttachmentRepository>,
    sla_config: Arc<SlaConfigHolder>,
}

impl BackfillService {
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        timeline: Arc<dyn TimelineRepository>,
        attachments: Arc<dyn AttachmentRepository>,
        sla_config: Arc<SlaConfigHolder>,
    ) -> Self {
        Self {
            tickets,
            timeline,
            attachments,
            sla_config,
        }
    }

    pub async fn run(&self) -> DomainResult<BackfillReport> {
        let mut report = BackfillReport::default();

        // 1) Creation and status changes from ticket rows
        for row in self.tickets.list_ticket_rows().await? {
            let id = row.id;
            let ticket = match row.into_ticket() {
                Ok(ticket) => ticket,
                Err(e) => {
                    warn!("Skipping ticket {} during backfill: {}", id, e);
                    report.skipped_tickets += 1;
                    continue;
                }
            };

            let created = NewTimelineEvent {
                ticket_id: ticket.id,
                actor_id: None,
                description: "Ticket opened".to_string(),
                payload: TimelinePayload::Created {
                    status: TicketStatus::Open,
                },
                created_at: ticket.opened_at,
            };
            if self.timeline.append_event_if_absent(&created).await?.is_some() {
                report.created += 1;
            }

            for event in self.status_events(&ticket) {
                if self.timeline.append_event_if_absent(&event).await?.is_some() {
                    report.status_changes += 1;
                }
            }
        }

        // 2) Attachments received from requesters, 4) attachments sent by support
        let attachments = self.attachments.list_attachments().await?;
        for attachment in attachments
            .iter()
            .filter(|a| a.direction == AttachmentDirection::Received)
        {
            let event = NewTimelineEvent {
                ticket_id: attachment.ticket_id,
                actor_id: attachment.uploaded_by,
                description: format!("Attachment received: {}", attachment.filename),
                payload: TimelinePayload::AttachmentReceived {
                    attachment: attachment.to_ref(),
                },
                created_at: attachment.uploaded_at,
            };
            if self.timeline.append_event_if_absent(&event).await?.is_some() {
                report.attachments_received += 1;
            }
        }

        // 3) Sent messages
        for message in self.attachments.list_outbound_messages().await? {
            let event = NewTimelineEvent {
                ticket_id: message.ticket_id,
                actor_id: message.sent_by,
                description: format!(
                    "Email sent: {} to {}",
                    message.subject,
                    message.recipients.join(", ")
                ),
                payload: TimelinePayload::TicketSent {
                    subject: message.subject,
                    recipients: message.recipients,
                    fingerprint: message.fingerprint,
                },
                created_at: message.sent_at,
            };
            if self.timeline.append_event_if_absent(&event).await?.is_some() {
                report.tickets_sent += 1;
            }
        }

        for attachment in attachments
            .iter()
            .filter(|a| a.direction == AttachmentDirection::Sent)
        {
            let event = NewTimelineEvent {
                ticket_id: attachment.ticket_id,
                actor_id: attachment.uploaded_by,
                description: format!("Attachment sent: {}", attachment.filename),
                payload: TimelinePayload::AttachmentSent {
                    attachment: attachment.to_ref(),
                },
                created_at: attachment.uploaded_at,
            };
            if self.timeline.append_event_if_absent(&event).await?.is_some() {
                report.attachments_sent += 1;
            }
        }

        info!(
            created = report.created,
            status_changes = report.status_changes,
            attachments_received = report.attachments_received,
            tickets_sent = report.tickets_sent,
            attachments_sent = report.attachments_sent,
            skipped_tickets = report.skipped_tickets,
            "Timeline backfill finished"
        );
        Ok(report)
    }

    /// Status changes implied by the markers a ticket carries.
    fn status_events(&self, ticket: &Ticket) -> Vec<NewTimelineEvent> {
        let mut events = Vec::new();
        let pickup = ticket.state.pickup();

        if let Some(pickup) = pickup {
            events.push(status_event(
                ticket,
                TicketStatus::Open,
                TicketStatus::InProgress,
                None,
                pickup.at,
                pickup.by,
            ));
        }

        let before = if pickup.is_some() {
            TicketStatus::InProgress
        } else {
            TicketStatus::Open
        };
        match ticket.state {
            TicketState::Completed { resolution, .. } => {
                let config = self.sla_config.snapshot();
                let sla = match sla_calculator::evaluate(ticket, &config, resolution.at) {
                    Ok(evaluation) => Some(SlaOutcome::from(&evaluation)),
                    Err(e) => {
                        warn!("No SLA outcome for backfilled ticket {}: {}", ticket.id, e);
                        None
                    }
                };
                events.push(status_event(
                    ticket,
                    before,
                    TicketStatus::Completed,
                    sla,
                    resolution.at,
                    resolution.by,
                ));
            }
            TicketState::Cancelled { resolution, .. } => {
                events.push(status_event(
                    ticket,
                    before,
                    TicketStatus::Cancelled,
                    None,
                    resolution.at,
                    resolution.by,
                ));
            }
            TicketState::Open | TicketState::InProgress(_) => {}
        }
        events
    }
}

fn status_event(
    ticket: &Ticket,
    before: TicketStatus,
    after: TicketStatus,
    sla: Option<SlaOutcome>,
    at: chrono::DateTime<chrono::Utc>,
    by: i64,
) -> NewTimelineEvent {
    NewTimelineEvent {
        ticket_id: ticket.id,
        actor_id: Some(by),
        description: format!("Status changed from {} to {}", before, after),
        payload: TimelinePayload::StatusChanged { before, after, sla },
        created_at: at,
    }
}
