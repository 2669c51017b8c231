use crate::domain::entities::{ActorId, NewTicket, StatusLabels, Ticket, TicketId, TicketStatus};
use crate::infrastructure::http::middleware::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub id: TicketId,
    pub code: String,
    pub protocol: String,
    pub priority: String,
    pub category: String,
    pub requester_name: String,
    pub requester_email: String,
    pub description: Option<String>,
    pub status: TicketStatus,
    pub status_label: String,
    pub opened_at: DateTime<Utc>,
    pub assumed_at: Option<DateTime<Utc>>,
    pub assumed_by: Option<ActorId>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<ActorId>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<ActorId>,
}

impl TicketResponse {
    pub fn new(ticket: Ticket, labels: &StatusLabels) -> Self {
        let status = ticket.status();
        let pickup = ticket.state.pickup();
        let completed = ticket.state.completed();
        let cancelled = ticket.state.cancelled();
        Self {
            id: ticket.id,
            code: ticket.code,
            protocol: ticket.protocol,
            priority: ticket.priority,
            category: ticket.category,
            requester_name: ticket.requester_name,
            requester_email: ticket.requester_email,
            description: ticket.description,
            status,
            status_label: labels.label(status).to_string(),
            opened_at: ticket.opened_at,
            assumed_at: pickup.map(|p| p.at),
            assumed_by: pickup.map(|p| p.by),
            completed_at: completed.map(|r| r.at),
            completed_by: completed.map(|r| r.by),
            cancelled_at: cancelled.map(|r| r.at),
            cancelled_by: cancelled.map(|r| r.by),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub ticket: TicketResponse,
    pub event_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListTicketsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub actor_id: ActorId,
}

pub(crate) fn parse_status(raw: Option<&str>) -> ApiResult<Option<TicketStatus>> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().parse::<TicketStatus>().map_err(ApiError::BadRequest))
        .transpose()
}

pub async fn create_ticket(
    State(state): State<AppState>,
    Json(request): Json<NewTicket>,
) -> ApiResult<(StatusCode, Json<TicketResponse>)> {
    let ticket = state.ticket_service.create(request).await?;
    let labels = state.ticket_service.labels();
    Ok((StatusCode::CREATED, Json(TicketResponse::new(ticket, labels))))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    Query(params): Query<ListTicketsQuery>,
) -> ApiResult<Json<Vec<TicketResponse>>> {
    let status = parse_status(params.status.as_deref())?;
    let tickets = state
        .ticket_service
        .list(status, params.limit.unwrap_or(50), params.offset.unwrap_or(0))
        .await?;
    let labels = state.ticket_service.labels();
    Ok(Json(
        tickets
            .into_iter()
            .map(|ticket| TicketResponse::new(ticket, labels))
            .collect(),
    ))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
) -> ApiResult<Json<TicketResponse>> {
    let ticket = state.ticket_service.get(id).await?;
    Ok(Json(TicketResponse::new(ticket, state.ticket_service.labels())))
}

pub async fn delete_ticket(
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
) -> ApiResult<StatusCode> {
    state.ticket_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assume_ticket(
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
    Json(request): Json<TransitionRequest>,
) -> ApiResult<Json<TransitionResponse>> {
    let outcome = state.ticket_service.assume(id, request.actor_id).await?;
    Ok(Json(transition_response(&state, outcome)))
}

pub async fn complete_ticket(
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
    Json(request): Json<TransitionRequest>,
) -> ApiResult<Json<TransitionResponse>> {
    let outcome = state.ticket_service.complete(id, request.actor_id).await?;
    Ok(Json(transition_response(&state, outcome)))
}

pub async fn cancel_ticket(
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
    Json(request): Json<TransitionRequest>,
) -> ApiResult<Json<TransitionResponse>> {
    let outcome = state.ticket_service.cancel(id, request.actor_id).await?;
    Ok(Json(transition_response(&state, outcome)))
}

fn transition_response(
    state: &AppState,
    outcome: crate::services::TransitionOutcome,
) -> TransitionResponse {
    TransitionResponse {
        event_id: outcome.event.id,
        ticket: TicketResponse::new(outcome.ticket, state.ticket_service.labels()),
    }
}

