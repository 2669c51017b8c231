use super::test_db::{setup_test_db, TestDatabase};
use axum::{
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use deskline::bootstrap::{assemble, Adapters};
use deskline::domain::entities::{Actor, ActorId, ActorRole, NewTicket, StatusLabels, Ticket};
use deskline::domain::ports::{ActorRepository, FixedClock, RecordingNotifier};
use deskline::infrastructure::http::middleware::AppState;
use deskline::infrastructure::http::router::build_router;
use deskline::infrastructure::persistence::Database;
use deskline::infrastructure::storage::LocalAttachmentStore;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const SUPPORT: ActorId = 10;
pub const OTHER_SUPPORT: ActorId = 11;
pub const REQUESTER: ActorId = 20;

/// 2026-01-12 is a Monday.
pub fn monday_at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 12, hour, minute, 0).unwrap()
}

pub fn friday_before_at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 9, hour, minute, 0).unwrap()
}

pub struct TestApp {
    pub state: AppState,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub attachment_dir: PathBuf,
    test_db: TestDatabase,
}

impl TestApp {
    pub fn db(&self) -> Database {
        self.test_db.db()
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn new_ticket(priority: &str) -> NewTicket {
        NewTicket {
            priority: priority.to_string(),
            category: "Access".to_string(),
            requester_name: "Ana Souza".to_string(),
            requester_email: "ana@example.com".to_string(),
            description: Some("Cannot log in to the portal".to_string()),
            opened_by: Some(REQUESTER),
        }
    }

    pub async fn open_ticket(&self, priority: &str) -> Ticket {
        self.state
            .ticket_service
            .create(Self::new_ticket(priority))
            .await
            .expect("Failed to open ticket")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.attachment_dir);
    }
}

pub async fn setup_app() -> TestApp {
    setup_app_with(RecordingNotifier::new()).await
}

pub async fn setup_app_with(notifier: RecordingNotifier) -> TestApp {
    let test_db = setup_test_db().await;
    let clock = Arc::new(FixedClock::new(monday_at(8, 0)));
    let notifier = Arc::new(notifier);
    let attachment_dir = std::env::temp_dir().join(format!("deskline-test-{}", Uuid::new_v4()));

    let state = assemble(
        test_db.db(),
        Adapters {
            clock: clock.clone(),
            notifier: notifier.clone(),
            store: Arc::new(LocalAttachmentStore::new(attachment_dir.clone())),
            labels: StatusLabels::default(),
            timeline_channel_capacity: 16,
        },
    )
    .await
    .expect("Failed to assemble application state");

    for (id, name, role) in [
        (SUPPORT, "Bruno Lima", ActorRole::Support),
        (OTHER_SUPPORT, "Carla Dias", ActorRole::Support),
        (REQUESTER, "Ana Souza", ActorRole::Requester),
    ] {
        state
            .actors
            .upsert_actor(&Actor {
                id,
                name: name.to_string(),
                role,
            })
            .await
            .expect("Failed to register actor");
    }

    TestApp {
        state,
        clock,
        notifier,
        attachment_dir,
        test_db,
    }
}

pub fn json_request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("Response body is not JSON")
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

pub async fn send(router: Router, request: Request<Body>) -> TestResponse {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}
