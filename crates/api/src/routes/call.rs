use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use pawchat_db::models::{CallHistoryEntry, QualitySample, Resolution};
use pawchat_services::call::{CallSession, JoinToken};
use serde::Deserialize;

use super::message::rfc3339;
use crate::{
    error::{ApiError, parse_id},
    extractors::auth::AuthUser,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct InitiateCallRequest {
    #[serde(rename = "matchId", alias = "match_id")]
    pub match_id: String,
    #[serde(rename = "receiverId", alias = "receiver_id")]
    pub receiver_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MuteRequest {
    pub muted: bool,
}

#[derive(Debug, Deserialize)]
pub struct VideoRequest {
    #[serde(rename = "videoEnabled", alias = "video_enabled")]
    pub video_enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityRequest {
    #[serde(alias = "packet_loss")]
    pub packet_loss: f64,
    pub latency: f64,
    pub jitter: f64,
    pub bitrate: f64,
    pub resolution: Option<Resolution>,
    #[serde(alias = "frame_rate")]
    pub frame_rate: Option<f64>,
}

impl From<QualityRequest> for QualitySample {
    fn from(r: QualityRequest) -> Self {
        QualitySample {
            packet_loss: r.packet_loss,
            latency: r.latency,
            jitter: r.jitter,
            bitrate: r.bitrate,
            resolution: r.resolution,
            frame_rate: r.frame_rate,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn initiate(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<InitiateCallRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let match_id = parse_id(&body.match_id, "matchId")?;
    let receiver_id = parse_id(&body.receiver_id, "receiverId")?;

    let call = state
        .calls
        .initiate(match_id, auth.user_id, receiver_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "session": session_json(&call.session),
            "token": call.token.token,
            "token_placeholder": call.token.placeholder,
            "server_url": call.server_url,
        })),
    ))
}

pub async fn token(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<JoinToken>, ApiError> {
    Ok(Json(state.calls.get_token(&session_id, auth.user_id)?))
}

pub async fn accept(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<JoinToken>, ApiError> {
    Ok(Json(state.calls.accept(&session_id, auth.user_id)?))
}

pub async fn reject(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = state.calls.reject(&session_id, auth.user_id)?;
    Ok(Json(session_json(&session)))
}

pub async fn end(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = state.calls.end(&session_id, auth.user_id).await?;
    Ok(Json(session_json(&session)))
}

pub async fn active(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(match_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mid = parse_id(&match_id, "match_id")?;
    let session = state.calls.get_active_call(mid, auth.user_id).await?;
    Ok(Json(serde_json::json!({
        "active": session.is_some(),
        "session": session.as_ref().map(session_json),
    })))
}

pub async fn mute(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<String>,
    Json(body): Json<MuteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.calls.toggle_mute(&session_id, auth.user_id, body.muted)?;
    Ok(Json(serde_json::json!({ "muted": body.muted })))
}

pub async fn video(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<String>,
    Json(body): Json<VideoRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .calls
        .toggle_video(&session_id, auth.user_id, body.video_enabled)?;
    Ok(Json(serde_json::json!({ "video_enabled": body.video_enabled })))
}

pub async fn camera(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.calls.switch_camera(&session_id, auth.user_id)?;
    Ok(Json(serde_json::json!({ "switched": true })))
}

pub async fn quality(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<String>,
    Json(body): Json<QualityRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .calls
        .report_quality(&session_id, auth.user_id, body.into())?;
    Ok(Json(serde_json::json!({ "recorded": true })))
}

pub async fn history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(match_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mid = parse_id(&match_id, "match_id")?;
    let entries = state.calls.history(mid, auth.user_id, query.limit).await?;
    let items: Vec<serde_json::Value> = entries.iter().map(history_json).collect();
    Ok(Json(serde_json::json!({ "items": items })))
}

fn session_json(s: &CallSession) -> serde_json::Value {
    serde_json::json!({
        "session_id": s.session_id,
        "match_id": s.match_id.to_hex(),
        "caller_id": s.caller_id.to_hex(),
        "receiver_id": s.receiver_id.to_hex(),
        "status": s.status.as_str(),
        "room_name": s.room_name,
        "created_at": rfc3339(s.created_at),
        "started_at": s.started_at.map(rfc3339),
        "ended_at": s.ended_at.map(rfc3339),
        "duration_secs": s.duration_secs(),
    })
}

fn history_json(e: &CallHistoryEntry) -> serde_json::Value {
    serde_json::json!({
        "session_id": e.session_id,
        "match_id": e.match_id.to_hex(),
        "caller_id": e.caller_id.to_hex(),
        "receiver_id": e.receiver_id.to_hex(),
        "status": e.status.as_str(),
        "room_name": e.room_name,
        "started_at": e.started_at.map(rfc3339),
        "ended_at": rfc3339(e.ended_at),
        "duration_secs": e.duration_secs,
        "quality": {
            "avg_packet_loss": e.quality.avg_packet_loss,
            "avg_latency": e.quality.avg_latency,
            "avg_jitter": e.quality.avg_jitter,
            "avg_bitrate": e.quality.avg_bitrate,
            "samples": e.quality.per_user.len(),
        },
    })
}
