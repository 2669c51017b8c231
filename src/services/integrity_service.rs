use crate::domain::entities::{TicketId, TicketRow, TicketStatus, TimelineEventKind};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{TicketRepository, TimelineRepository};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedTicket {
    pub ticket_id: TicketId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub restored: Vec<TicketId>,
    pub unresolved: Vec<UnresolvedTicket>,
}

/// Repairs tickets whose status lacks its marker, using only what the
/// timeline recorded. Nothing is ever invented: tickets without a matching
/// event are reported for manual review.
#[derive(Clone)]
pub struct IntegrityService {
    tickets: Arc<dyn TicketRepository>,
    timeline: Arc<dyn TimelineRepository>,
}

impl IntegrityService {
    pub fn new(tickets: Arc<dyn TicketRepository>, timeline: Arc<dyn TimelineRepository>) -> Self {
        Self { tickets, timeline }
    }

    pub async fn reconcile(&self) -> DomainResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for row in self.tickets.list_ticket_rows().await? {
            report.scanned += 1;
            let id = row.id;
            let error = match row.clone().into_ticket() {
                Ok(_) => continue,
                Err(e) => e,
            };

            match self.repair(&row).await {
                Ok(()) => {
                    info!("Restored missing {} marker of ticket {} from its timeline", row.status, id);
                    report.restored.push(id);
                }
                Err(reason) => {
                    warn!("Ticket {} needs manual review: {} ({})", id, reason, error);
                    report.unresolved.push(UnresolvedTicket {
                        ticket_id: id,
                        reason,
                    });
                }
            }
        }

        info!(
            scanned = report.scanned,
            restored = report.restored.len(),
            unresolved = report.unresolved.len(),
            "Integrity reconciliation finished"
        );
        Ok(report)
    }

    async fn repair(&self, row: &TicketRow) -> Result<(), String> {
        let status: TicketStatus = row.status.parse()?;
        let missing = match status {
            TicketStatus::InProgress => row.assumed_at.is_none(),
            TicketStatus::Completed => row.completed_at.is_none(),
            TicketStatus::Cancelled => row.cancelled_at.is_none(),
            TicketStatus::Open => false,
        };
        if !missing {
            return Err("status and markers disagree beyond a missing timestamp".to_string());
        }

        let event = self
            .timeline
            .find_event(row.id, TimelineEventKind::StatusChanged, status.as_str())
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("no {} event recorded", status))?;
        let actor = event
            .actor_id
            .ok_or_else(|| format!("{} event {} has no actor", status, event.id))?;

        self.tickets
            .restore_terminal_marker(row.id, status, event.created_at, actor)
            .await
            .map_err(|e| e.to_string())?;

        // The row must now decode cleanly
        match self.tickets.get_ticket(row.id).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err("ticket disappeared during reconciliation".to_string()),
            Err(DomainError::DataIntegrity(msg)) => Err(msg),
            Err(e) => Err(e.to_string()),
        }
    }
}
