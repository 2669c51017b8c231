pub mod actors;
pub mod attachments;
pub mod health;
pub mod sla;
pub mod tickets;
pub mod timeline;
pub mod ws;
