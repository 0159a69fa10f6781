use std::sync::Arc;

use axum::extract::ws::Message;
use bson::oid::ObjectId;
use futures::SinkExt;
use pawchat_services::notify::{Notifier, RealtimeEvent};
use tracing::{debug, warn};
use uuid::Uuid;

use super::presence::Presence;
use crate::routes::message::{rfc3339, to_response};

/// Broadcasts a JSON message to all connections of the specified users.
pub async fn broadcast(
    presence: &Presence,
    user_ids: &[ObjectId],
    message: &serde_json::Value,
) {
    let text = serde_json::to_string(message).unwrap_or_default();

    for user_id in user_ids {
        let senders = presence.senders(user_id);
        for sender in senders {
            let text = text.clone();
            let mut guard = sender.lock().await;
            if let Err(e) = guard.send(Message::text(text)).await {
                warn!(%user_id, %e, "Failed to send WS message");
            } else {
                debug!(%user_id, "WS message sent");
            }
        }
    }
}

/// Sends a JSON message to a specific user's connections.
pub async fn send_to_user(
    presence: &Presence,
    user_id: &ObjectId,
    message: &serde_json::Value,
) {
    broadcast(presence, &[*user_id], message).await;
}

/// Sends a JSON message to one connection, used for replies to the socket that asked.
pub async fn send_to_connection(
    presence: &Presence,
    connection_id: Uuid,
    message: &serde_json::Value,
) {
    if let Some(sender) = presence.sender(connection_id) {
        let text = serde_json::to_string(message).unwrap_or_default();
        let mut guard = sender.lock().await;
        if let Err(e) = guard.send(Message::text(text)).await {
            warn!(%connection_id, %e, "Failed to send WS message to connection");
        }
    }
}

/// Renders a service event as the `{type, data}` frame clients receive.
pub fn event_frame(event: &RealtimeEvent) -> serde_json::Value {
    let data = match event {
        RealtimeEvent::NewMessage { match_id, message }
        | RealtimeEvent::MessageEdited { match_id, message } => serde_json::json!({
            "match_id": match_id.to_hex(),
            "message": to_response((**message).clone()),
        }),
        RealtimeEvent::MessageDeleted {
            match_id,
            message_id,
        } => serde_json::json!({
            "match_id": match_id.to_hex(),
            "message_id": message_id.to_hex(),
        }),
        RealtimeEvent::ReactionAdded {
            match_id,
            message_id,
            reaction,
        } => serde_json::json!({
            "match_id": match_id.to_hex(),
            "message_id": message_id.to_hex(),
            "user_id": reaction.user.to_hex(),
            "emoji": reaction.emoji,
            "reacted_at": rfc3339(reaction.reacted_at),
        }),
        RealtimeEvent::ReactionRemoved {
            match_id,
            message_id,
            user_id,
            emoji,
        } => serde_json::json!({
            "match_id": match_id.to_hex(),
            "message_id": message_id.to_hex(),
            "user_id": user_id.to_hex(),
            "emoji": emoji,
        }),
        RealtimeEvent::MessagesRead {
            match_id,
            user_id,
            count,
        } => serde_json::json!({
            "match_id": match_id.to_hex(),
            "user_id": user_id.to_hex(),
            "count": count,
        }),
        RealtimeEvent::HistoryCleared { match_id, user_id } => serde_json::json!({
            "match_id": match_id.to_hex(),
            "user_id": user_id.to_hex(),
        }),
        RealtimeEvent::MessageModerated {
            match_id,
            message_id,
            status,
        } => serde_json::json!({
            "match_id": match_id.to_hex(),
            "message_id": message_id.to_hex(),
            "status": status.as_str(),
        }),
        RealtimeEvent::CallIncoming {
            session_id,
            match_id,
            caller_id,
            room_name,
            token,
            token_placeholder,
        } => serde_json::json!({
            "session_id": session_id,
            "match_id": match_id.to_hex(),
            "caller_id": caller_id.to_hex(),
            "room_name": room_name,
            "token": token,
            "token_placeholder": token_placeholder,
        }),
        RealtimeEvent::CallAccepted {
            session_id,
            room_name,
        } => serde_json::json!({
            "session_id": session_id,
            "room_name": room_name,
        }),
        RealtimeEvent::CallRejected { session_id } | RealtimeEvent::CallMissed { session_id } => {
            serde_json::json!({ "session_id": session_id })
        }
        RealtimeEvent::CallEnded {
            session_id,
            duration_secs,
        } => serde_json::json!({
            "session_id": session_id,
            "duration_secs": duration_secs,
        }),
        RealtimeEvent::CallMuteChanged {
            session_id,
            user_id,
            muted,
        } => serde_json::json!({
            "session_id": session_id,
            "user_id": user_id.to_hex(),
            "muted": muted,
        }),
        RealtimeEvent::CallVideoChanged {
            session_id,
            user_id,
            video_enabled,
        } => serde_json::json!({
            "session_id": session_id,
            "user_id": user_id.to_hex(),
            "video_enabled": video_enabled,
        }),
        RealtimeEvent::CallCameraSwitched {
            session_id,
            user_id,
        } => serde_json::json!({
            "session_id": session_id,
            "user_id": user_id.to_hex(),
        }),
    };

    serde_json::json!({
        "type": event.name(),
        "data": data,
    })
}

/// Pushes service events to the recipients' live sockets.
///
/// Delivery runs on a spawned task; offline recipients simply miss the event.
pub struct WsNotifier {
    presence: Arc<Presence>,
}

impl WsNotifier {
    pub fn new(presence: Arc<Presence>) -> Self {
        Self { presence }
    }
}

impl Notifier for WsNotifier {
    fn dispatch(&self, recipients: &[ObjectId], event: RealtimeEvent) {
        let frame = event_frame(&event);
        let recipients = recipients.to_vec();
        let presence = self.presence.clone();
        debug!(event = event.name(), recipients = recipients.len(), "Dispatching event");
        tokio::spawn(async move {
            broadcast(&presence, &recipients, &frame).await;
        });
    }
}
