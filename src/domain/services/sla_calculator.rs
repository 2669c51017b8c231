use crate::domain::entities::{SlaConfig, SlaEvaluation, SlaStatus, Ticket, TicketState};
use crate::domain::errors::DomainResult;
use crate::domain::services::business_calendar::BusinessCalendar;
use chrono::{DateTime, Utc};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Evaluate a ticket's SLA compliance.
///
/// Completed tickets are measured up to `completed_at`, cancelled ones up to
/// `cancelled_at`, everything still in flight up to `now`. The result for an
/// open ticket therefore changes with time and must not be cached.
pub fn evaluate(ticket: &Ticket, config: &SlaConfig, now: DateTime<Utc>) -> DomainResult<SlaEvaluation> {
    let sla_limit_hours = config.limit_for(&ticket.priority)?;
    let calendar = BusinessCalendar::new(&config.calendar)?;

    let endpoint = match ticket.state {
        TicketState::Completed { resolution, .. } | TicketState::Cancelled { resolution, .. } => {
            resolution.at
        }
        TicketState::Open | TicketState::InProgress(_) => now,
    };

    let elapsed_wall_hours = wall_hours_between(ticket.opened_at, endpoint);
    let elapsed_business_hours = calendar.business_hours_between(ticket.opened_at, endpoint);

    let status = match ticket.state {
        TicketState::Cancelled { .. } => SlaStatus::Excluded,
        _ if elapsed_business_hours > sla_limit_hours => SlaStatus::Violated,
        _ => SlaStatus::OnTrack,
    };

    let completed = matches!(ticket.state, TicketState::Completed { .. });

    Ok(SlaEvaluation {
        elapsed_wall_hours,
        elapsed_business_hours,
        sla_limit_hours,
        status,
        resolution_wall_hours: completed.then_some(elapsed_wall_hours),
        resolution_business_hours: completed.then_some(elapsed_business_hours),
    })
}

fn wall_hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let seconds = (end - start).num_seconds().max(0);
    seconds as f64 / SECONDS_PER_HOUR
}
