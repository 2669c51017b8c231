use crate::domain::entities::{
    ActorId, NewTimelineEvent, Ticket, TicketAction, TicketDraft, TicketId, TicketRow,
    TicketState, TicketStatus, TimelineEvent,
};
use crate::domain::errors::DomainResult;
use chrono::{DateTime, Utc};

/// A state change to persist together with its timeline event.
#[derive(Debug, Clone)]
pub struct TransitionRecord {
    pub ticket_id: TicketId,
    pub action: TicketAction,
    /// Status the ticket must still have for the update to apply.
    pub expected: TicketStatus,
    pub next: TicketState,
    pub event: NewTimelineEvent,
}

#[async_trait::async_trait]
pub trait TicketRepository: Send + Sync {
    /// Insert the ticket and its `created` event in one transaction.
    async fn insert_ticket(
        &self,
        draft: &TicketDraft,
        description: &str,
    ) -> DomainResult<(Ticket, TimelineEvent)>;

    async fn get_ticket(&self, id: TicketId) -> DomainResult<Option<Ticket>>;

    /// Existence check that does not decode the row.
    async fn ticket_exists(&self, id: TicketId) -> DomainResult<bool>;

    /// One page of raw rows, newest first. Callers decode each row so one
    /// inconsistent ticket does not hide the rest.
    async fn list_ticket_page(
        &self,
        status: Option<TicketStatus>,
        limit: i64,
        offset: i64,
    ) -> DomainResult<Vec<TicketRow>>;

    /// Apply the state change and append its event atomically. Fails with
    /// `InvalidTransition` when the ticket no longer has `expected` status.
    async fn apply_transition(&self, transition: &TransitionRecord) -> DomainResult<TimelineEvent>;

    /// Delete a ticket and every row it owns. Returns the storage keys of the
    /// removed attachments, or `None` when the ticket is absent.
    async fn delete_ticket(&self, id: TicketId) -> DomainResult<Option<Vec<String>>>;

    /// Raw rows, including ones that fail to decode.
    async fn list_ticket_rows(&self) -> DomainResult<Vec<TicketRow>>;

    /// Fill in a missing terminal marker. Only touches rows still lacking it.
    async fn restore_terminal_marker(
        &self,
        id: TicketId,
        status: TicketStatus,
        at: DateTime<Utc>,
        by: ActorId,
    ) -> DomainResult<bool>;
}
