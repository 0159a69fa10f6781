use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use bson::DateTime;
use pawchat_db::models::{Attachment, Message, MessageKind};
use pawchat_services::chat::{SendMessage, ThreadNode};
use pawchat_services::dao::base::{PaginatedResult, PaginationParams};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    error::{ApiError, parse_id},
    extractors::auth::AuthUser,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub content: Option<String>,
    #[serde(alias = "messageType", alias = "type")]
    pub kind: Option<MessageKind>,
    pub payload: Option<serde_json::Value>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(alias = "replyTo")]
    pub reply_to: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMessageRequest {
    #[validate(length(min = 1))]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: String,
    pub sender_id: String,
    pub content: String,
    pub kind: MessageKind,
    pub payload: Option<serde_json::Value>,
    pub attachments: Vec<Attachment>,
    pub reply_to: Option<String>,
    pub reactions: Vec<ReactionResponse>,
    pub read_by: Vec<String>,
    pub sent_at: String,
    pub edited_at: Option<String>,
    pub is_edited: bool,
    pub is_deleted: bool,
    pub moderation_status: String,
}

#[derive(Debug, Serialize)]
pub struct ReactionResponse {
    pub user_id: String,
    pub emoji: String,
    pub reacted_at: String,
}

#[derive(Debug, Serialize)]
pub struct ThreadResponse {
    #[serde(flatten)]
    pub message: MessageResponse,
    pub replies: Vec<ThreadResponse>,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(match_id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mid = parse_id(&match_id, "match_id")?;
    let page = state.chat.list_messages(mid, auth.user_id, &params).await?;

    Ok(Json(serde_json::json!({
        "messages": page_json(page.messages.map(to_response)),
        "unread_count": page.unread_count,
        "match_status": page.match_status,
        "blocked": page.blocked,
        "blocked_by_counterpart": page.blocked_by_counterpart,
    })))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(match_id): Path<String>,
    Json(body): Json<CreateMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let mid = parse_id(&match_id, "match_id")?;
    let reply_to = body
        .reply_to
        .as_deref()
        .map(|id| parse_id(id, "reply_to"))
        .transpose()?;

    let message = state
        .chat
        .send(
            mid,
            auth.user_id,
            SendMessage {
                content: body.content,
                kind: body.kind,
                payload: body.payload,
                attachments: body.attachments,
                reply_to,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(to_response(message))))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<String>,
    Json(body): Json<UpdateMessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    body.validate()?;
    let msg_id = parse_id(&message_id, "message_id")?;
    let message = state.chat.edit(msg_id, auth.user_id, &body.content).await?;
    Ok(Json(to_response(message)))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let msg_id = parse_id(&message_id, "message_id")?;
    let message = state.chat.delete(msg_id, auth.user_id).await?;
    Ok(Json(serde_json::json!({
        "deleted": true,
        "message": to_response(message),
    })))
}

pub async fn search(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(match_id): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mid = parse_id(&match_id, "match_id")?;
    let params = PaginationParams {
        page: query.page,
        limit: query.limit,
    };
    let result = state
        .chat
        .search_messages(mid, auth.user_id, &query.q, &params)
        .await?;
    Ok(Json(page_json(result.map(to_response))))
}

pub async fn thread(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((match_id, root_id)): Path<(String, String)>,
) -> Result<Json<ThreadResponse>, ApiError> {
    let mid = parse_id(&match_id, "match_id")?;
    let root = parse_id(&root_id, "message_id")?;
    let tree = state.chat.get_thread(mid, auth.user_id, root).await?;
    Ok(Json(to_thread_response(tree)))
}

pub(crate) fn page_json<T: Serialize>(result: PaginatedResult<T>) -> serde_json::Value {
    serde_json::json!({
        "items": result.items,
        "total": result.total,
        "page": result.page,
        "per_page": result.per_page,
        "total_pages": result.total_pages,
        "has_more": result.has_more,
    })
}

fn to_thread_response(node: ThreadNode) -> ThreadResponse {
    ThreadResponse {
        message: to_response(node.message),
        replies: node.children.into_iter().map(to_thread_response).collect(),
    }
}

pub(crate) fn rfc3339(at: DateTime) -> String {
    at.try_to_rfc3339_string().unwrap_or_default()
}

pub(crate) fn reactions_response(m: &Message) -> Vec<ReactionResponse> {
    m.reactions
        .iter()
        .map(|r| ReactionResponse {
            user_id: r.user.to_hex(),
            emoji: r.emoji.clone(),
            reacted_at: rfc3339(r.reacted_at),
        })
        .collect()
}

pub(crate) fn to_response(m: Message) -> MessageResponse {
    let payload = serde_json::to_value(&m.body)
        .ok()
        .and_then(|mut body| body.get_mut("payload").map(serde_json::Value::take));

    MessageResponse {
        id: m.id.to_hex(),
        sender_id: m.sender.to_hex(),
        kind: m.kind(),
        payload,
        reactions: reactions_response(&m),
        read_by: m.read_by.iter().map(|r| r.user.to_hex()).collect(),
        reply_to: m.reply_to.map(|r| r.to_hex()),
        sent_at: rfc3339(m.sent_at),
        edited_at: m.edited_at.map(rfc3339),
        is_edited: m.is_edited,
        is_deleted: m.is_deleted,
        moderation_status: m.moderation_status.as_str().to_string(),
        attachments: m.attachments,
        content: m.content,
    }
}
