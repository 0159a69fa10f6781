use axum::{
    Json,
    extract::{Path, Query, State},
};
use pawchat_db::models::{MessageKind, ModerationStatus};
use pawchat_services::chat::ModerationAction;
use pawchat_services::dao::base::PaginationParams;
use serde::Deserialize;
use validator::Validate;

use super::message::{MessageResponse, page_json, to_response};
use crate::{
    error::{ApiError, parse_id},
    extractors::auth::AuthUser,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    pub status: Option<ModerationStatus>,
    pub kind: Option<MessageKind>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ModerateRequest {
    pub action: ModerationAction,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

pub async fn queue(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<QueueQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = query.status.unwrap_or(ModerationStatus::Pending);
    let params = PaginationParams {
        page: query.page,
        limit: query.limit,
    };
    let queue = state
        .chat
        .moderation_queue(auth.role, status, query.kind, &params)
        .await?
        .map(|item| {
            serde_json::json!({
                "match_id": item.match_id.to_hex(),
                "message": to_response(item.message),
            })
        });

    let mut body = page_json(queue);
    body["status"] = serde_json::json!(status.as_str());
    Ok(Json(body))
}

pub async fn moderate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((match_id, message_id)): Path<(String, String)>,
    Json(body): Json<ModerateRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    body.validate()?;
    let mid = parse_id(&match_id, "match_id")?;
    let msg_id = parse_id(&message_id, "message_id")?;

    let message = state
        .chat
        .moderate(mid, msg_id, auth.user_id, auth.role, body.action, body.reason)
        .await?;
    Ok(Json(to_response(message)))
}
