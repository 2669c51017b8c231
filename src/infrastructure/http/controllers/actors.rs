use crate::domain::entities::{Actor, ActorId, ActorRole};
use crate::infrastructure::http::middleware::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct UpsertActorRequest {
    pub name: String,
    pub role: ActorRole,
}

/// Register or rename the person behind an actor id shown on timelines.
pub async fn upsert_actor(
    State(state): State<AppState>,
    Path(id): Path<ActorId>,
    Json(request): Json<UpsertActorRequest>,
) -> ApiResult<Json<Actor>> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Actor name is required".to_string()));
    }
    let actor = Actor {
        id,
        name: name.to_string(),
        role: request.role,
    };
    state.actors.upsert_actor(&actor).await?;
    tracing::info!("Actor {} saved as {}", actor.id, actor.role.as_str());
    Ok(Json(actor))
}
