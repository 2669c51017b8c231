pub mod attachment_service;
pub mod backfill_service;
pub mod correspondence_service;
pub mod integrity_service;
pub mod sla_config;
pub mod sla_service;
pub mod ticket_service;
pub mod timeline_hub;
pub mod timeline_service;

pub use attachment_service::AttachmentService;
pub use backfill_service::{BackfillReport, BackfillService};
pub use correspondence_service::{CorrespondenceService, OutboundTicket, SentTicket};
pub use integrity_service::{IntegrityService, ReconcileReport};
pub use sla_config::SlaConfigHolder;
pub use sla_service::{SlaReportEntry, SlaService};
pub use ticket_service::{TicketService, TransitionOutcome};
pub use timeline_hub::{LiveEvent, TimelineFeed, TimelineHub, ViewerId};
pub use timeline_service::{Preconditions, SyncOutcome, TimelineEventView, TimelineService};
