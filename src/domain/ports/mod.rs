pub mod actor_repository;
pub mod attachment_repository;
pub mod attachment_store;
pub mod clock;
pub mod notifier;
pub mod sla_config_repository;
pub mod ticket_repository;
pub mod timeline_repository;

pub use actor_repository::ActorRepository;
pub use attachment_repository::AttachmentRepository;
pub use attachment_store::AttachmentStore;
pub use clock::{Clock, FixedClock, SystemClock};
pub use notifier::{Notifier, RecordingNotifier};
pub use sla_config_repository::SlaConfigRepository;
pub use ticket_repository::{TicketRepository, TransitionRecord};
pub use timeline_repository::TimelineRepository;
