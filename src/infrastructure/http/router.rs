use crate::domain::entities::MAX_ATTACHMENT_SIZE;
use crate::infrastructure::http::controllers::{
    actors, attachments, health, sla, tickets, timeline, ws,
};
use crate::infrastructure::http::middleware::AppState;
use crate::infrastructure::observability::request_span;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Base64 inflates uploads by a third; leave room for the JSON envelope.
pub const MAX_BODY_SIZE: usize = MAX_ATTACHMENT_SIZE / 3 * 4 + 1024 * 1024;

/// Layers run top to bottom: the body limit sits outside CORS, which needs a
/// `Default` response body from the service it wraps.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Tickets
        .route(
            "/api/tickets",
            get(tickets::list_tickets).post(tickets::create_ticket),
        )
        .route(
            "/api/tickets/:id",
            get(tickets::get_ticket).delete(tickets::delete_ticket),
        )
        .route("/api/tickets/:id/assume", post(tickets::assume_ticket))
        .route("/api/tickets/:id/complete", post(tickets::complete_ticket))
        .route("/api/tickets/:id/cancel", post(tickets::cancel_ticket))
        // SLA
        .route("/api/tickets/:id/sla", get(sla::get_ticket_sla))
        .route("/api/sla/report", get(sla::get_sla_report))
        .route(
            "/api/sla/config",
            get(sla::get_sla_config).put(sla::update_sla_config),
        )
        .route("/api/sla/config/reload", post(sla::reload_sla_config))
        // Timeline
        .route("/api/tickets/:id/timeline", get(timeline::get_timeline))
        .route("/api/timeline/ws", get(ws::timeline_socket))
        // Attachments and correspondence
        .route(
            "/api/tickets/:id/attachments",
            post(attachments::upload_attachment),
        )
        .route(
            "/api/attachments/:id/download",
            get(attachments::download_attachment),
        )
        .route("/api/tickets/:id/send", post(attachments::send_ticket))
        // Actors
        .route("/api/actors/:id", put(actors::upsert_actor))
        .route("/health", get(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::disable()),
        )
        .with_state(state)
}
