mod helpers;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use deskline::infrastructure::http::router::MAX_BODY_SIZE;
use helpers::*;
use serde_json::json;

async fn create_ticket_over_http(app: &TestApp, priority: &str) -> i64 {
    let response = send(
        app.router(),
        json_request(
            Method::POST,
            "/api/tickets",
            Some(json!({
                "priority": priority,
                "category": "Network",
                "requester_name": "Ana Souza",
                "requester_email": "ana@example.com",
                "description": "VPN drops every hour",
                "opened_by": REQUESTER
            })),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let body = response.json();
    assert_eq!(body["status"], "open");
    assert_eq!(body["status_label"], "Open");
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_timeline_lists_events_oldest_first_with_validators() {
    let app = setup_app().await;
    let id = create_ticket_over_http(&app, "High").await;

    app.clock.set(monday_at(9, 30));
    let response = send(
        app.router(),
        json_request(
            Method::POST,
            &format!("/api/tickets/{}/assume", id),
            Some(json!({ "actor_id": SUPPORT })),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["ticket"]["status"], "in_progress");

    let response = send(
        app.router(),
        json_request(Method::GET, &format!("/api/tickets/{}/timeline", id), None),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.header("etag").unwrap().starts_with("W/\""));
    assert_eq!(
        response.header("last-modified").as_deref(),
        Some("Mon, 12 Jan 2026 09:30:00 GMT")
    );
    assert_eq!(
        response.header("cache-control").as_deref(),
        Some("public, max-age=30, must-revalidate")
    );

    let events = response.json();
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["kind"], "created");
    assert_eq!(events[0]["statusNovo"], "open");
    assert_eq!(events[0]["actorRole"], "requester");
    assert_eq!(events[1]["kind"], "status_changed");
    assert_eq!(events[1]["statusBefore"], "open");
    assert_eq!(events[1]["statusNovo"], "in_progress");
    assert_eq!(events[1]["actorId"], SUPPORT);
    assert_eq!(events[1]["actorName"], "Bruno Lima");
    assert_eq!(events[1]["actorRole"], "support");
    assert!(events[0]["id"].as_i64().unwrap() < events[1]["id"].as_i64().unwrap());
}

#[tokio::test]
async fn test_since_id_returns_only_newer_events() {
    let app = setup_app().await;
    let id = create_ticket_over_http(&app, "High").await;
    app.state.ticket_service.assume(id, SUPPORT).await.unwrap();

    let all = send(
        app.router(),
        json_request(Method::GET, &format!("/api/tickets/{}/timeline", id), None),
    )
    .await
    .json();
    let first_id = all[0]["id"].as_i64().unwrap();
    let last_id = all[1]["id"].as_i64().unwrap();

    let newer = send(
        app.router(),
        json_request(
            Method::GET,
            &format!("/api/tickets/{}/timeline?since_id={}", id, first_id),
            None,
        ),
    )
    .await
    .json();
    assert_eq!(newer.as_array().unwrap().len(), 1);
    assert_eq!(newer[0]["id"].as_i64().unwrap(), last_id);

    let caught_up = send(
        app.router(),
        json_request(
            Method::GET,
            &format!("/api/tickets/{}/timeline?since_id={}", id, last_id),
            None,
        ),
    )
    .await;
    assert_eq!(caught_up.status, StatusCode::OK);
    assert_eq!(caught_up.json(), json!([]));

    let limited = send(
        app.router(),
        json_request(
            Method::GET,
            &format!("/api/tickets/{}/timeline?limit=1", id),
            None,
        ),
    )
    .await
    .json();
    assert_eq!(limited.as_array().unwrap().len(), 1);
    assert_eq!(limited[0]["id"].as_i64().unwrap(), first_id);
}

#[tokio::test]
async fn test_matching_validator_yields_not_modified() {
    let app = setup_app().await;
    let id = create_ticket_over_http(&app, "High").await;
    let uri = format!("/api/tickets/{}/timeline", id);

    let first = send(app.router(), json_request(Method::GET, &uri, None)).await;
    let etag = first.header("etag").unwrap();
    let last_modified = first.header("last-modified").unwrap();

    let mut request = json_request(Method::GET, &uri, None);
    request
        .headers_mut()
        .insert("if-none-match", etag.parse().unwrap());
    let cached = send(app.router(), request).await;
    assert_eq!(cached.status, StatusCode::NOT_MODIFIED);
    assert!(cached.body.is_empty());
    assert_eq!(cached.header("etag"), Some(etag.clone()));

    let mut request = json_request(Method::GET, &uri, None);
    request
        .headers_mut()
        .insert("if-modified-since", last_modified.parse().unwrap());
    let cached = send(app.router(), request).await;
    assert_eq!(cached.status, StatusCode::NOT_MODIFIED);

    // A new event changes the validator
    app.clock.set(monday_at(10, 0));
    app.state.ticket_service.assume(id, SUPPORT).await.unwrap();
    let mut request = json_request(Method::GET, &uri, None);
    request
        .headers_mut()
        .insert("if-none-match", etag.parse().unwrap());
    let fresh = send(app.router(), request).await;
    assert_eq!(fresh.status, StatusCode::OK);
    assert_ne!(fresh.header("etag"), Some(etag));
    assert_eq!(fresh.json().as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_ticket_timeline_is_not_found() {
    let app = setup_app().await;
    let response = send(
        app.router(),
        json_request(Method::GET, "/api/tickets/4242/timeline", None),
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.json()["error"].is_string());
}

#[tokio::test]
async fn test_error_statuses_follow_domain_errors() {
    let app = setup_app().await;
    let id = create_ticket_over_http(&app, "High").await;
    let assume = format!("/api/tickets/{}/assume", id);

    let ok = send(
        app.router(),
        json_request(Method::POST, &assume, Some(json!({ "actor_id": SUPPORT }))),
    )
    .await;
    assert_eq!(ok.status, StatusCode::OK);

    let conflict = send(
        app.router(),
        json_request(Method::POST, &assume, Some(json!({ "actor_id": SUPPORT }))),
    )
    .await;
    assert_eq!(conflict.status, StatusCode::CONFLICT);

    let unknown_priority = send(
        app.router(),
        json_request(
            Method::POST,
            "/api/tickets",
            Some(json!({
                "priority": "Someday",
                "category": "Network",
                "requester_name": "Ana Souza",
                "requester_email": "ana@example.com"
            })),
        ),
    )
    .await;
    assert_eq!(unknown_priority.status, StatusCode::UNPROCESSABLE_ENTITY);

    let bad_status = send(
        app.router(),
        json_request(Method::GET, "/api/tickets?status=snoozed", None),
    )
    .await;
    assert_eq!(bad_status.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sla_config_round_trip_over_http() {
    let app = setup_app().await;

    let current = send(app.router(), json_request(Method::GET, "/api/sla/config", None)).await;
    assert_eq!(current.status, StatusCode::OK);
    let mut body = current.json();
    let revision = body["revision"].as_u64().unwrap();
    assert_eq!(body["config"]["limits"]["Critical"], 4.0);

    body["config"]["limits"]["Critical"] = json!(3.0);
    let updated = send(
        app.router(),
        json_request(Method::PUT, "/api/sla/config", Some(body["config"].clone())),
    )
    .await;
    assert_eq!(updated.status, StatusCode::OK);
    let updated = updated.json();
    assert_eq!(updated["config"]["limits"]["Critical"], 3.0);
    assert!(updated["revision"].as_u64().unwrap() > revision);

    let health = send(app.router(), json_request(Method::GET, "/health", None)).await;
    assert_eq!(health.status, StatusCode::OK);
}

#[tokio::test]
async fn test_router_applies_cors_and_body_limit() {
    let app = setup_app().await;

    let mut request = json_request(Method::GET, "/health", None);
    request
        .headers_mut()
        .insert("origin", "https://portal.example.com".parse().unwrap());
    let response = send(app.router(), request).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.header("access-control-allow-origin").as_deref(),
        Some("*")
    );

    let oversized = Request::builder()
        .method(Method::POST)
        .uri("/api/tickets")
        .header("content-type", "application/json")
        .header("content-length", (MAX_BODY_SIZE + 1).to_string())
        .body(Body::from(vec![b' '; MAX_BODY_SIZE + 1]))
        .unwrap();
    let response = send(app.router(), oversized).await;
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_malformed_cursor_parameters_are_ignored() {
    let app = setup_app().await;
    let id = create_ticket_over_http(&app, "High").await;
    app.state.ticket_service.assume(id, SUPPORT).await.unwrap();

    for query in ["since_id=abc", "limit=lots", "since_id=&limit=", "since=yesterday&limit=x"] {
        let response = send(
            app.router(),
            json_request(
                Method::GET,
                &format!("/api/tickets/{}/timeline?{}", id, query),
                None,
            ),
        )
        .await;
        assert_eq!(response.status, StatusCode::OK, "query {}", query);
        assert_eq!(response.json().as_array().unwrap().len(), 2, "query {}", query);
    }
}
