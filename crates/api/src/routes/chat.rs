use axum::{
    Json,
    extract::{Path, State},
};
use pawchat_services::chat::ChatStats;
use serde::Deserialize;

use super::message::{rfc3339, reactions_response};
use crate::{
    error::{ApiError, parse_id},
    extractors::auth::AuthUser,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct BlockRequest {
    pub blocked: bool,
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(match_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mid = parse_id(&match_id, "match_id")?;
    let count = state.chat.mark_read(mid, auth.user_id).await?;
    Ok(Json(serde_json::json!({ "marked_read": count })))
}

pub async fn set_blocked(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(match_id): Path<String>,
    Json(body): Json<BlockRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mid = parse_id(&match_id, "match_id")?;
    let m = state.chat.set_blocked(mid, auth.user_id, body.blocked).await?;
    Ok(Json(serde_json::json!({
        "match_id": m.id.to_hex(),
        "blocked": m.is_blocked_by(auth.user_id),
        "last_activity": rfc3339(m.last_activity),
    })))
}

pub async fn clear_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(match_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mid = parse_id(&match_id, "match_id")?;
    let cleared = state.chat.clear_history(mid, auth.user_id).await?;
    Ok(Json(serde_json::json!({ "cleared": cleared })))
}

pub async fn stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ChatStats>, ApiError> {
    Ok(Json(state.chat.stats(auth.user_id).await?))
}

/// Chronological dump of the conversation for the requesting participant.
pub async fn export(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(match_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mid = parse_id(&match_id, "match_id")?;
    let export = state.chat.export_chat(mid, auth.user_id).await?;

    let messages: Vec<serde_json::Value> = export
        .messages
        .iter()
        .map(|m| {
            serde_json::json!({
                "sender_id": m.sender.to_hex(),
                "content": m.content,
                "kind": m.kind(),
                "attachments": m.attachments,
                "sent_at": rfc3339(m.sent_at),
                "reactions": reactions_response(m),
            })
        })
        .collect();

    Ok(Json(serde_json::json!({
        "match_id": export.match_id.to_hex(),
        "exported_at": rfc3339(export.exported_at),
        "messages": messages,
    })))
}
