use crate::config::Config;
use crate::domain::entities::StatusLabels;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{
    ActorRepository, AttachmentRepository, AttachmentStore, Clock, Notifier,
    SlaConfigRepository, SystemClock, TicketRepository, TimelineRepository,
};
use crate::infrastructure::http::middleware::AppState;
use crate::infrastructure::persistence::Database;
use crate::infrastructure::providers::{LogNotifier, SmtpNotifier};
use crate::infrastructure::storage::LocalAttachmentStore;
use crate::services::*;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Failed to prepare attachment directory: {0}")]
    AttachmentDir(#[from] std::io::Error),

    #[error("Failed to configure SMTP notifier: {0}")]
    Notifier(String),
}

/// Adapters the services are built on. Tests swap in fixed clocks and
/// recording notifiers.
pub struct Adapters {
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn Notifier>,
    pub store: Arc<dyn AttachmentStore>,
    pub labels: StatusLabels,
    pub timeline_channel_capacity: usize,
}

/// Read the stored SLA rules into a fresh holder.
pub async fn load_sla_holder(db: &Database) -> DomainResult<Arc<SlaConfigHolder>> {
    let config = db.load_sla_config().await?;
    Ok(Arc::new(SlaConfigHolder::new(config)?))
}

pub async fn build_app_state(db: Database, config: &Config) -> Result<AppState, BootstrapError> {
    std::fs::create_dir_all(&config.attachment_dir)?;
    let store = Arc::new(LocalAttachmentStore::new(&config.attachment_dir));
    tracing::info!("Attachments stored under {}", config.attachment_dir);

    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(settings) => {
            let notifier = SmtpNotifier::new(settings).map_err(BootstrapError::Notifier)?;
            tracing::info!("Outbound tickets delivered through SMTP relay {}", settings.host);
            Arc::new(notifier)
        }
        None => {
            tracing::warn!("SMTP_HOST not set, outbound tickets are only logged");
            Arc::new(LogNotifier)
        }
    };

    let adapters = Adapters {
        clock: Arc::new(SystemClock),
        notifier,
        store,
        labels: config.status_labels.clone(),
        timeline_channel_capacity: config.timeline_channel_capacity,
    };
    Ok(assemble(db, adapters).await?)
}

/// Wire repositories, adapters and services into the HTTP state.
pub async fn assemble(db: Database, adapters: Adapters) -> DomainResult<AppState> {
    let tickets: Arc<dyn TicketRepository> = Arc::new(db.clone());
    let timeline: Arc<dyn TimelineRepository> = Arc::new(db.clone());
    let actors: Arc<dyn ActorRepository> = Arc::new(db.clone());
    let attachments: Arc<dyn AttachmentRepository> = Arc::new(db.clone());
    let sla_repo: Arc<dyn SlaConfigRepository> = Arc::new(db.clone());

    let holder = load_sla_holder(&db).await?;
    tracing::info!(
        "SLA configuration loaded ({} priorities)",
        holder.snapshot().limits.len()
    );

    let hub = Arc::new(TimelineHub::new(adapters.timeline_channel_capacity));
    let feed = TimelineFeed::new(actors.clone(), hub.clone());

    let ticket_service = TicketService::new(
        tickets.clone(),
        holder.clone(),
        feed.clone(),
        adapters.clock.clone(),
        Arc::new(adapters.labels),
        adapters.notifier.clone(),
        actors.clone(),
        adapters.store.clone(),
    );
    let sla_service = SlaService::new(
        tickets.clone(),
        sla_repo,
        holder,
        adapters.clock.clone(),
    );
    let timeline_service = TimelineService::new(tickets.clone(), timeline);
    let attachment_service = AttachmentService::new(
        tickets.clone(),
        attachments.clone(),
        adapters.store.clone(),
        feed.clone(),
        adapters.clock.clone(),
    );
    let correspondence_service = CorrespondenceService::new(
        tickets,
        attachments,
        adapters.store,
        adapters.notifier,
        feed,
        adapters.clock,
    );

    Ok(AppState {
        db,
        actors,
        ticket_service,
        sla_service,
        timeline_service,
        timeline_hub: hub,
        attachment_service,
        correspondence_service,
    })
}

pub async fn backfill_service(db: &Database) -> DomainResult<BackfillService> {
    let holder = load_sla_holder(db).await?;
    Ok(BackfillService::new(
        Arc::new(db.clone()),
        Arc::new(db.clone()),
        Arc::new(db.clone()),
        holder,
    ))
}

pub fn integrity_service(db: &Database) -> IntegrityService {
    IntegrityService::new(Arc::new(db.clone()), Arc::new(db.clone()))
}
