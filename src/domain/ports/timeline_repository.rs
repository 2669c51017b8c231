use crate::domain::entities::{
    NewTimelineEvent, PageSummary, TicketId, TimelineEntry, TimelineEvent,
    TimelineEventKind, TimelineQuery,
};
use crate::domain::errors::DomainResult;

#[async_trait::async_trait]
pub trait TimelineRepository: Send + Sync {
    async fn append_event(&self, event: &NewTimelineEvent) -> DomainResult<TimelineEvent>;

    /// Append unless an event with the same `(ticket, kind, natural key)`
    /// already exists. Returns `None` when skipped.
    async fn append_event_if_absent(
        &self,
        event: &NewTimelineEvent,
    ) -> DomainResult<Option<TimelineEvent>>;

    /// Events after the cursor, oldest first.
    async fn query_events(
        &self,
        ticket_id: TicketId,
        query: &TimelineQuery,
    ) -> DomainResult<Vec<TimelineEntry>>;

    /// Count, highest id and newest timestamp of the page `query` selects.
    async fn page_summary(
        &self,
        ticket_id: TicketId,
        query: &TimelineQuery,
    ) -> DomainResult<PageSummary>;

    async fn find_event(
        &self,
        ticket_id: TicketId,
        kind: TimelineEventKind,
        natural_key: &str,
    ) -> DomainResult<Option<TimelineEvent>>;
}
