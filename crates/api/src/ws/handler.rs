use std::sync::Arc;

use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::{IntoResponse, Response},
};
use bson::oid::ObjectId;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let claims = match state.auth.verify_access_token(&params.token) {
        Ok(c) => c,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let user_id = match ObjectId::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return ApiError::BadRequest("Invalid user ID".to_string()).into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: ObjectId) {
    let (sender, mut receiver) = socket.split();
    let sender = Arc::new(Mutex::new(sender));

    let connection_id = state.presence.join(user_id, sender.clone());
    info!(%user_id, %connection_id, "WebSocket connected");

    let hello = serde_json::json!({
        "type": "connected",
        "data": {
            "user_id": user_id.to_hex(),
            "connection_id": connection_id.to_string(),
        }
    });
    super::dispatcher::send_to_connection(&state.presence, connection_id, &hello).await;

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_client_message(&state, user_id, connection_id, &text).await;
            }
            Ok(Message::Ping(data)) => {
                let mut guard = sender.lock().await;
                let _ = guard.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => {
                break;
            }
            Err(e) => {
                warn!(%user_id, %connection_id, %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    if let Some(departure) = state.presence.leave(connection_id) {
        // Clear any indicator the closed socket left running
        if let Some(match_id) = departure.typing_in {
            relay_typing(&state, user_id, match_id, TYPING_STOP).await;
        }
        info!(
            %user_id,
            %connection_id,
            went_offline = departure.went_offline,
            "WebSocket disconnected"
        );
    }
}

const TYPING_START: &str = "typing:start";
const TYPING_STOP: &str = "typing:stop";

async fn handle_client_message(
    state: &AppState,
    user_id: ObjectId,
    connection_id: Uuid,
    text: &str,
) {
    let parsed: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return,
    };

    let msg_type = parsed.get("type").and_then(|t| t.as_str()).unwrap_or("");
    let data = parsed.get("data");

    debug!(%user_id, %connection_id, msg_type, "WS message received");

    match msg_type {
        "ping" => {
            let pong = serde_json::json!({ "type": "pong" });
            super::dispatcher::send_to_connection(&state.presence, connection_id, &pong).await;
        }
        TYPING_START | TYPING_STOP => {
            let Some(match_id) = data
                .and_then(|d| d.get("match_id"))
                .and_then(|c| c.as_str())
                .and_then(|raw| ObjectId::parse_str(raw).ok())
            else {
                return;
            };
            let typing_in = (msg_type == TYPING_START).then_some(match_id);
            let previous = state.presence.set_typing(connection_id, typing_in);
            // Switching conversations stops the indicator in the one left behind
            if let Some(previous) = previous.filter(|p| *p != match_id) {
                relay_typing(state, user_id, previous, TYPING_STOP).await;
            }
            relay_typing(state, user_id, match_id, msg_type).await;
        }
        _ => {
            debug!(msg_type, "Unknown WS message type");
        }
    }
}

/// Forwards a typing indicator to the other participant if they are connected.
async fn relay_typing(state: &AppState, user_id: ObjectId, match_id: ObjectId, kind: &str) {
    let Ok(m) = state.matches.find_by_id(match_id).await else {
        return;
    };
    let Some(counterpart) = m.counterpart(user_id) else {
        return;
    };
    if !state.presence.is_online(&counterpart) {
        return;
    }
    let event = serde_json::json!({
        "type": kind,
        "data": {
            "match_id": match_id.to_hex(),
            "user_id": user_id.to_hex(),
        }
    });
    super::dispatcher::send_to_user(&state.presence, &counterpart, &event).await;
}
