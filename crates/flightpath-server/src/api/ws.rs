//! WebSocket streaming of route updates and waypoint status changes.
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

/// Handler for WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsQuery>,
) -> axum::response::Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.route_id))
        .into_response()
}

#[derive(Debug, Deserialize, Default)]
pub struct WsQuery {
    /// A route id or lineage id; everything is streamed when absent.
    route_id: Option<Uuid>,
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, route_filter: Option<Uuid>) {
    let mut rx = state.tx.subscribe();
    // Follow the lineage so a reroute does not strand the subscriber.
    let mut follow = route_filter.map(|id| {
        state
            .routes
            .get(&id)
            .map(|stored| stored.lineage)
            .unwrap_or(id)
    });

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        if let Some(id) = follow {
                            if !event.concerns(&id) {
                                continue;
                            }
                            follow = Some(event.lineage);
                        }
                        if socket.send(Message::Text(event.payload.as_ref().to_owned())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::debug!("WebSocket subscriber lagged, dropped {} update(s)", missed);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
}
