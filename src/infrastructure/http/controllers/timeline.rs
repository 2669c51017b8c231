use crate::domain::entities::{TicketId, TimelineQuery};
use crate::infrastructure::http::middleware::{ApiResult, AppState};
use crate::services::timeline_service::{http_date, parse_http_date, parse_since};
use crate::services::{Preconditions, SyncOutcome};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

const CACHE_CONTROL: &str = "public, max-age=30, must-revalidate";

#[derive(Debug, Deserialize)]
pub struct TimelineParams {
    pub limit: Option<String>,
    pub since_id: Option<String>,
    pub since: Option<String>,
}

/// Cursor parameters that do not parse are dropped, never rejected.
fn lenient_number(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| value.trim().parse().ok())
}

fn preconditions(headers: &HeaderMap) -> Preconditions {
    let text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    Preconditions {
        if_none_match: text(header::IF_NONE_MATCH),
        if_modified_since: text(header::IF_MODIFIED_SINCE).and_then(|raw| parse_http_date(&raw)),
    }
}

fn validators(etag: &str, last_modified: Option<DateTime<Utc>>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(etag) {
        headers.insert(header::ETAG, value);
    }
    if let Some(value) = last_modified.and_then(|at| HeaderValue::from_str(&http_date(at)).ok()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
    headers
}

/// Events of a ticket after the given cursor, oldest first.
pub async fn get_timeline(
    State(state): State<AppState>,
    Path(ticket_id): Path<TicketId>,
    Query(params): Query<TimelineParams>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let since = params.since.as_deref().and_then(parse_since);
    let query = TimelineQuery::new(
        lenient_number(params.since_id.as_deref()),
        since,
        lenient_number(params.limit.as_deref()),
    );

    let outcome = state
        .timeline_service
        .sync(ticket_id, query, &preconditions(&headers))
        .await?;

    let response = match outcome {
        SyncOutcome::NotModified {
            etag,
            last_modified,
        } => (StatusCode::NOT_MODIFIED, validators(&etag, last_modified)).into_response(),
        SyncOutcome::Page {
            etag,
            last_modified,
            events,
        } => (StatusCode::OK, validators(&etag, last_modified), Json(events)).into_response(),
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_number_drops_garbage() {
        assert_eq!(lenient_number(Some(" 42 ")), Some(42));
        assert_eq!(lenient_number(Some("abc")), None);
        assert_eq!(lenient_number(Some("")), None);
        assert_eq!(lenient_number(None), None);
    }
}
