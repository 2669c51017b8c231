//! Live timeline push over WebSocket.
//!
//! Clients send `{"type":"subscribe","ticket_id":N}`, `unsubscribe` or
//! `ping`; the server answers `subscribed_timeline`, `unsubscribed_timeline`
//! or `pong` and pushes `timeline_event` frames for subscribed tickets.

use crate::domain::entities::TicketId;
use crate::infrastructure::http::middleware::AppState;
use crate::services::{LiveEvent, TimelineEventView, TimelineHub};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { ticket_id: TicketId },
    Unsubscribe { ticket_id: TicketId },
    Ping,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    SubscribedTimeline { ticket_id: TicketId },
    UnsubscribedTimeline { ticket_id: TicketId },
    Pong,
    TimelineEvent {
        ticket_id: TicketId,
        event: TimelineEventView,
    },
    Error { message: String },
}

impl From<LiveEvent> for ServerMessage {
    fn from(live: LiveEvent) -> Self {
        ServerMessage::TimelineEvent {
            ticket_id: live.ticket_id,
            event: live.event,
        }
    }
}

pub async fn timeline_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let hub = state.timeline_hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<TimelineHub>) {
    let (viewer, mut events) = hub.register().await;
    let (mut sink, mut stream) = socket.split();

    loop {
        let reply = tokio::select! {
            pushed = events.recv() => match pushed {
                Some(live) => ServerMessage::from(live),
                // Pruned by the hub
                None => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => handle_control(&hub, viewer, &text).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!("Timeline viewer {} socket error: {}", viewer, e);
                    break;
                }
                Some(Ok(_)) => continue,
            },
        };

        let frame = match serde_json::to_string(&reply) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("Failed to encode timeline frame: {}", e);
                continue;
            }
        };
        if sink.send(Message::Text(frame)).await.is_err() {
            break;
        }
    }

    hub.drop_viewer(viewer).await;
}

async fn handle_control(hub: &TimelineHub, viewer: u64, text: &str) -> ServerMessage {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Subscribe { ticket_id }) => {
            hub.subscribe(viewer, ticket_id).await;
            ServerMessage::SubscribedTimeline { ticket_id }
        }
        Ok(ClientMessage::Unsubscribe { ticket_id }) => {
            hub.unsubscribe(viewer, ticket_id).await;
            ServerMessage::UnsubscribedTimeline { ticket_id }
        }
        Ok(ClientMessage::Ping) => ServerMessage::Pong,
        Err(e) => ServerMessage::Error {
            message: format!("Unrecognised message: {}", e),
        },
    }
}
