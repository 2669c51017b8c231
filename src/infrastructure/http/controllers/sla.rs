use crate::domain::entities::{SlaConfig, SlaEvaluation, TicketId, TicketStatus};
use crate::infrastructure::http::controllers::tickets::parse_status;
use crate::infrastructure::http::middleware::{ApiResult, AppState};
use crate::services::SlaReportEntry;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct TicketSlaResponse {
    pub ticket_id: TicketId,
    pub code: String,
    pub priority: String,
    pub status: TicketStatus,
    #[serde(flatten)]
    pub evaluation: SlaEvaluation,
}

#[derive(Debug, Deserialize)]
pub struct SlaReportQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SlaConfigResponse {
    pub revision: u64,
    pub config: Arc<SlaConfig>,
}

pub async fn get_ticket_sla(
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
) -> ApiResult<Json<TicketSlaResponse>> {
    let (ticket, evaluation) = state.sla_service.evaluate_ticket(id).await?;
    Ok(Json(TicketSlaResponse {
        ticket_id: ticket.id,
        status: ticket.status(),
        code: ticket.code,
        priority: ticket.priority,
        evaluation,
    }))
}

pub async fn get_sla_report(
    State(state): State<AppState>,
    Query(params): Query<SlaReportQuery>,
) -> ApiResult<Json<Vec<SlaReportEntry>>> {
    let status = parse_status(params.status.as_deref())?;
    let entries = state
        .sla_service
        .report(status, params.limit.unwrap_or(100))
        .await?;
    Ok(Json(entries))
}

pub async fn get_sla_config(State(state): State<AppState>) -> ApiResult<Json<SlaConfigResponse>> {
    let (config, revision) = state.sla_service.current_config();
    Ok(Json(SlaConfigResponse { revision, config }))
}

pub async fn update_sla_config(
    State(state): State<AppState>,
    Json(config): Json<SlaConfig>,
) -> ApiResult<Json<SlaConfigResponse>> {
    state.sla_service.update_config(config).await?;
    get_sla_config(State(state)).await
}

pub async fn reload_sla_config(
    State(state): State<AppState>,
) -> ApiResult<Json<SlaConfigResponse>> {
    state.sla_service.reload().await?;
    get_sla_config(State(state)).await
}
