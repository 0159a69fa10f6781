use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use validator::Validate;

use super::message::reactions_response;
use crate::{
    error::{ApiError, parse_id},
    extractors::auth::AuthUser,
    state::AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct AddReactionRequest {
    #[validate(length(min = 1, max = 32))]
    pub emoji: String,
}

pub async fn add(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<String>,
    Json(body): Json<AddReactionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    body.validate()?;
    let msg_id = parse_id(&message_id, "message_id")?;
    let message = state
        .chat
        .add_reaction(msg_id, auth.user_id, &body.emoji)
        .await?;

    Ok(Json(serde_json::json!({
        "added": true,
        "reactions": reactions_response(&message),
    })))
}

pub async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((message_id, emoji)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let msg_id = parse_id(&message_id, "message_id")?;
    let message = state
        .chat
        .remove_reaction(msg_id, auth.user_id, &emoji)
        .await?;

    Ok(Json(serde_json::json!({
        "removed": true,
        "reactions": reactions_response(&message),
    })))
}
