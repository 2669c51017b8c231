use crate::domain::entities::{SlaConfig, SlaEvaluation, Ticket, TicketId, TicketStatus};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{Clock, SlaConfigRepository, TicketRepository};
use crate::domain::services::sla_calculator;
use crate::services::sla_config::SlaConfigHolder;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// One line of the advisory SLA report. Evaluation failures are reported per
/// ticket instead of aborting the listing.
#[derive(Debug, Clone, Serialize)]
pub struct SlaReportEntry {
    pub ticket_id: TicketId,
    pub code: String,
    pub priority: String,
    pub status: TicketStatus,
    pub evaluation: Option<SlaEvaluation>,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct SlaService {
    tickets: Arc<dyn TicketRepository>,
    config_repo: Arc<dyn SlaConfigRepository>,
    holder: Arc<SlaConfigHolder>,
    clock: Arc<dyn Clock>,
    /// Serialises writers so the stored and active configurations agree.
    write_lock: Arc<Mutex<()>>,
}

impl SlaService {
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        config_repo: Arc<dyn SlaConfigRepository>,
        holder: Arc<SlaConfigHolder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tickets,
            config_repo,
            holder,
            clock,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Evaluate one ticket now. Never cached: open tickets change with time.
    pub async fn evaluate_ticket(&self, id: TicketId) -> DomainResult<(Ticket, SlaEvaluation)> {
        let ticket = self
            .tickets
            .get_ticket(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Ticket {} not found", id)))?;
        let config = self.holder.snapshot();
        let evaluation = sla_calculator::evaluate(&ticket, &config, self.clock.now())?;
        Ok((ticket, evaluation))
    }

    pub async fn report(
        &self,
        status: Option<TicketStatus>,
        limit: i64,
    ) -> DomainResult<Vec<SlaReportEntry>> {
        let rows = self
            .tickets
            .list_ticket_page(status, limit.clamp(1, 1000), 0)
            .await?;
        let config = self.holder.snapshot();
        let now = self.clock.now();

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let Ok(row_status) = row.status.parse::<TicketStatus>() else {
                warn!("Ticket {} has unknown status '{}', left out of the SLA report", row.id, row.status);
                continue;
            };
            let (ticket_id, code, priority) = (row.id, row.code.clone(), row.priority.clone());
            let result = row
                .into_ticket()
                .and_then(|ticket| sla_calculator::evaluate(&ticket, &config, now));
            if let Err(e) = &result {
                warn!("SLA evaluation for ticket {} failed: {}", ticket_id, e);
            }
            entries.push(SlaReportEntry {
                ticket_id,
                code,
                priority,
                status: row_status,
                evaluation: result.as_ref().ok().copied(),
                error: result.err().map(|e| e.to_string()),
            });
        }
        Ok(entries)
    }

    /// Active configuration and its revision.
    pub fn current_config(&self) -> (Arc<SlaConfig>, u64) {
        (self.holder.snapshot(), self.holder.revision())
    }

    /// Validate, persist, then publish a new configuration.
    pub async fn update_config(&self, config: SlaConfig) -> DomainResult<u64> {
        config.validate()?;
        let _guard = self.write_lock.lock().await;
        self.config_repo.save_sla_config(&config).await?;
        let revision = self.holder.replace(config)?;
        info!("SLA configuration updated (revision {})", revision);
        Ok(revision)
    }

    /// Re-read the stored configuration. An invalid stored copy leaves the
    /// active one in place.
    pub async fn reload(&self) -> DomainResult<u64> {
        let _guard = self.write_lock.lock().await;
        let config = self.config_repo.load_sla_config().await?;
        let revision = self.holder.replace(config)?;
        info!("SLA configuration reloaded (revision {})", revision);
        Ok(revision)
    }
}
