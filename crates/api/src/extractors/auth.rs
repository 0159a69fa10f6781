use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use bson::oid::ObjectId;
use pawchat_services::auth::Role;

use crate::{error::ApiError, state::AppState};

/// Caller identity taken from a verified `Authorization: Bearer` token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: ObjectId,
    pub role: Role,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

        let claims = state.auth.verify_access_token(token)?;
        let user_id = ObjectId::parse_str(&claims.sub)
            .map_err(|_| ApiError::Unauthorized("Invalid subject in token".to_string()))?;

        Ok(AuthUser {
            user_id,
            role: claims.role,
        })
    }
}
