pub mod error;

pub use error::*;

use crate::domain::ports::ActorRepository;
use crate::infrastructure::persistence::Database;
use crate::services::{
    AttachmentService, CorrespondenceService, SlaService, TicketService, TimelineHub,
    TimelineService,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub actors: Arc<dyn ActorRepository>,
    pub ticket_service: TicketService,
    pub sla_service: SlaService,
    pub timeline_service: TimelineService,
    pub timeline_hub: Arc<TimelineHub>,
    pub attachment_service: AttachmentService,
    pub correspondence_service: CorrespondenceService,
}
