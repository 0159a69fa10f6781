use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use jsonwebtoken::{EncodingKey, Header, encode};
use pawchat_config::LiveKitSettings;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{CallError, CallResult};

/// What a participant may do in a media room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaGrant {
    pub room_name: String,
    pub identity: String,
    pub can_publish: bool,
    pub can_subscribe: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaToken {
    pub token: String,
    /// Set when no media credentials are configured; the token will not be
    /// accepted by a real media server.
    pub placeholder: bool,
}

pub trait MediaTokenIssuer: Send + Sync {
    fn issue(&self, grant: &MediaGrant) -> CallResult<MediaToken>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    pub room: String,
    pub room_join: bool,
    pub can_publish: bool,
    pub can_subscribe: bool,
    pub can_publish_data: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LiveKitClaims {
    pub iss: String,
    pub sub: String,
    pub nbf: u64,
    pub exp: u64,
    pub video: VideoGrant,
}

/// Signs LiveKit access tokens with the configured API key pair.
pub struct LiveKitTokenIssuer {
    api_key: String,
    key: EncodingKey,
    ttl_secs: u64,
}

impl LiveKitTokenIssuer {
    pub fn new(api_key: &str, api_secret: &str, ttl_secs: u64) -> Self {
        Self {
            api_key: api_key.to_string(),
            key: EncodingKey::from_secret(api_secret.as_bytes()),
            ttl_secs,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl MediaTokenIssuer for LiveKitTokenIssuer {
    fn issue(&self, grant: &MediaGrant) -> CallResult<MediaToken> {
        let now = unix_now();
        let claims = LiveKitClaims {
            iss: self.api_key.clone(),
            sub: grant.identity.clone(),
            nbf: now,
            exp: now + self.ttl_secs,
            video: VideoGrant {
                room: grant.room_name.clone(),
                room_join: true,
                can_publish: grant.can_publish,
                can_subscribe: grant.can_subscribe,
                can_publish_data: true,
            },
        };
        let token = encode(&Header::default(), &claims, &self.key)
            .map_err(|e| CallError::TokenIssuance(e.to_string()))?;
        Ok(MediaToken {
            token,
            placeholder: false,
        })
    }
}

/// Issues unsigned descriptors so calls can be exercised without a media server.
#[derive(Debug, Default)]
pub struct PlaceholderTokenIssuer;

impl MediaTokenIssuer for PlaceholderTokenIssuer {
    fn issue(&self, grant: &MediaGrant) -> CallResult<MediaToken> {
        warn!(
            room = %grant.room_name,
            identity = %grant.identity,
            "Media credentials not configured, issuing placeholder token"
        );
        let descriptor = serde_json::json!({
            "room": grant.room_name,
            "identity": grant.identity,
            "canPublish": grant.can_publish,
            "canSubscribe": grant.can_subscribe,
            "placeholder": true,
            "iat": unix_now(),
        });
        Ok(MediaToken {
            token: BASE64.encode(descriptor.to_string()),
            placeholder: true,
        })
    }
}

pub fn issuer_from_settings(settings: &LiveKitSettings) -> Arc<dyn MediaTokenIssuer> {
    match (&settings.api_key, &settings.api_secret) {
        (Some(key), Some(secret)) if settings.has_credentials() => {
            Arc::new(LiveKitTokenIssuer::new(key, secret, settings.token_ttl_secs))
        }
        _ => Arc::new(PlaceholderTokenIssuer),
    }
}
