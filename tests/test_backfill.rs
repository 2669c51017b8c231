mod helpers;

use deskline::bootstrap;
use deskline::domain::entities::*;
use deskline::domain::ports::TimelineRepository;
use deskline::infrastructure::persistence::Database;
use helpers::*;

const MON_0800: &str = "2026-01-12T08:00:00.000000Z";
const MON_0900: &str = "2026-01-12T09:00:00.000000Z";
const MON_1100: &str = "2026-01-12T11:00:00.000000Z";
const MON_1200: &str = "2026-01-12T12:00:00.000000Z";

struct LegacyTicket<'a> {
    code: &'a str,
    priority: &'a str,
    status: &'a str,
    assumed: Option<(&'a str, ActorId)>,
    completed: Option<(&'a str, ActorId)>,
    cancelled: Option<(&'a str, ActorId)>,
}

/// Insert a ticket row the way the system stored them before the timeline
/// existed: markers only, no events.
async fn insert_legacy_ticket(db: &Database, ticket: LegacyTicket<'_>) -> TicketId {
    let row = sqlx::query(
        "INSERT INTO tickets
            (code, protocol, priority, category, requester_name, requester_email, status,
             opened_at, opened_by, assumed_at, assumed_by, completed_at, completed_by,
             cancelled_at, cancelled_by)
         VALUES (?, ?, ?, 'Legacy', 'Old Requester', 'old@example.com', ?, ?, NULL, ?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(ticket.code)
    .bind(format!("P-{}", ticket.code))
    .bind(ticket.priority)
    .bind(ticket.status)
    .bind(MON_0800)
    .bind(ticket.assumed.map(|(at, _)| at))
    .bind(ticket.assumed.map(|(_, by)| by))
    .bind(ticket.completed.map(|(at, _)| at))
    .bind(ticket.completed.map(|(_, by)| by))
    .bind(ticket.cancelled.map(|(at, _)| at))
    .bind(ticket.cancelled.map(|(_, by)| by))
    .fetch_one(db.pool())
    .await
    .expect("Failed to insert legacy ticket");
    sqlx::Row::try_get(&row, "id").unwrap()
}

async fn events_of(db: &Database, ticket_id: TicketId) -> Vec<TimelineEntry> {
    db.query_events(ticket_id, &TimelineQuery::new(None, None, None))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_backfill_rebuilds_history_once() {
    let app = setup_app().await;
    let db = app.db();

    let completed = insert_legacy_ticket(
        &db,
        LegacyTicket {
            code: "OLD-1",
            priority: "Critical",
            status: "completed",
            assumed: Some((MON_0900, SUPPORT)),
            completed: Some((MON_1100, SUPPORT)),
            cancelled: None,
        },
    )
    .await;
    let cancelled = insert_legacy_ticket(
        &db,
        LegacyTicket {
            code: "OLD-2",
            priority: "Low",
            status: "cancelled",
            assumed: None,
            completed: None,
            cancelled: Some((MON_0900, OTHER_SUPPORT)),
        },
    )
    .await;
    insert_legacy_ticket(
        &db,
        LegacyTicket {
            code: "OLD-3",
            priority: "High",
            status: "open",
            assumed: None,
            completed: None,
            cancelled: None,
        },
    )
    .await;

    sqlx::query(
        "INSERT INTO attachments
            (id, ticket_id, filename, mime_type, size_bytes, direction, storage_key, uploaded_at, uploaded_by)
         VALUES ('att-in', ?, 'photo.jpg', 'image/jpeg', 100, 'received', 'legacy/att-in', ?, NULL)",
    )
    .bind(completed)
    .bind(MON_0900)
    .execute(db.pool())
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO outbound_messages
            (id, ticket_id, subject, recipients, text_body, fingerprint, sent_at, sent_by)
         VALUES ('msg-1', ?, 'Fixed', '[\"old@example.com\"]', 'Done', 'fp-1', ?, ?)",
    )
    .bind(completed)
    .bind(MON_1200)
    .bind(SUPPORT)
    .execute(db.pool())
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO attachments
            (id, ticket_id, filename, mime_type, size_bytes, direction, storage_key,
             outbound_message_id, uploaded_at, uploaded_by)
         VALUES ('att-out', ?, 'report.pdf', 'application/pdf', 2048, 'sent', 'legacy/att-out', 'msg-1', ?, ?)",
    )
    .bind(completed)
    .bind(MON_1200)
    .bind(SUPPORT)
    .execute(db.pool())
    .await
    .unwrap();

    // A ticket with live history must not gain duplicates
    let live = app.open_ticket("High").await;
    app.state.ticket_service.assume(live.id, SUPPORT).await.unwrap();

    let backfill = bootstrap::backfill_service(&db).await.unwrap();
    let report = backfill.run().await.unwrap();
    assert_eq!(report.created, 3);
    assert_eq!(report.status_changes, 3);
    assert_eq!(report.attachments_received, 1);
    assert_eq!(report.tickets_sent, 1);
    assert_eq!(report.attachments_sent, 1);
    assert_eq!(report.skipped_tickets, 0);

    let history = events_of(&db, completed).await;
    let kinds: Vec<_> = history.iter().map(|e| e.event.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            TimelineEventKind::Created,
            TimelineEventKind::StatusChanged,
            TimelineEventKind::StatusChanged,
            TimelineEventKind::AttachmentReceived,
            TimelineEventKind::TicketSent,
            TimelineEventKind::AttachmentSent,
        ]
    );
    match &history[2].event.payload {
        TimelinePayload::StatusChanged {
            before,
            after,
            sla: Some(sla),
        } => {
            assert_eq!(*before, TicketStatus::InProgress);
            assert_eq!(*after, TicketStatus::Completed);
            assert_eq!(sla.business_hours, 3.0);
            assert_eq!(sla.status, SlaStatus::OnTrack);
        }
        other => panic!("Expected completion with SLA, got {:?}", other),
    }
    assert_eq!(history[2].event.created_at, monday_at(11, 0));

    let cancelled_history = events_of(&db, cancelled).await;
    assert_eq!(cancelled_history.len(), 2);
    assert_eq!(
        cancelled_history[1].event.payload.status_change(),
        (Some(TicketStatus::Open), Some(TicketStatus::Cancelled))
    );

    assert_eq!(events_of(&db, live.id).await.len(), 2);

    let rerun = backfill.run().await.unwrap();
    assert_eq!(rerun.total(), 0);
}

#[tokio::test]
async fn test_backfill_skips_inconsistent_tickets() {
    let app = setup_app().await;
    let db = app.db();

    insert_legacy_ticket(
        &db,
        LegacyTicket {
            code: "BROKEN-1",
            priority: "High",
            status: "completed",
            assumed: None,
            completed: None,
            cancelled: None,
        },
    )
    .await;

    let report = bootstrap::backfill_service(&db).await.unwrap().run().await.unwrap();
    assert_eq!(report.skipped_tickets, 1);
    assert_eq!(report.total(), 0);
}
