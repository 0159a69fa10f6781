//! One-to-one call signaling between the two participants of a match.

pub mod registry;
pub mod signaling;
pub mod telemetry;
pub mod token;

use std::collections::HashMap;

use bson::{DateTime, oid::ObjectId};
use pawchat_db::models::{CallStatus, UserQuality};
use thiserror::Error;

use crate::dao::base::DaoError;

pub use registry::{InMemorySessionRegistry, SessionRegistry};
pub use signaling::{CallService, InitiatedCall, JoinToken};
pub use token::{MediaGrant, MediaToken, MediaTokenIssuer};

#[derive(Debug, Error)]
pub enum CallError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error("Media token issuance failed: {0}")]
    TokenIssuance(String),
    #[error(transparent)]
    Storage(#[from] DaoError),
}

pub type CallResult<T> = Result<T, CallError>;

/// A call between the two participants of a match.
///
/// Lives in the session registry until the grace period after it reaches a
/// terminal status.
#[derive(Debug, Clone)]
pub struct CallSession {
    pub session_id: String,
    pub match_id: ObjectId,
    pub caller_id: ObjectId,
    pub receiver_id: ObjectId,
    pub status: CallStatus,
    pub room_name: String,
    pub created_at: DateTime,
    pub started_at: Option<DateTime>,
    pub ended_at: Option<DateTime>,
    /// Latest sample per participant.
    pub quality: HashMap<ObjectId, UserQuality>,
}

impl CallSession {
    pub fn new(
        session_id: String,
        match_id: ObjectId,
        caller_id: ObjectId,
        receiver_id: ObjectId,
        now: DateTime,
    ) -> Self {
        let room_name = room_name(match_id, &session_id);
        Self {
            session_id,
            match_id,
            caller_id,
            receiver_id,
            status: CallStatus::Initiating,
            room_name,
            created_at: now,
            started_at: None,
            ended_at: None,
            quality: HashMap::new(),
        }
    }

    pub fn is_participant(&self, user_id: ObjectId) -> bool {
        self.caller_id == user_id || self.receiver_id == user_id
    }

    pub fn counterpart(&self, user_id: ObjectId) -> Option<ObjectId> {
        if self.caller_id == user_id {
            Some(self.receiver_id)
        } else if self.receiver_id == user_id {
            Some(self.caller_id)
        } else {
            None
        }
    }

    pub fn is_live(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Whole seconds between start and end; 0 for calls that never connected.
    pub fn duration_secs(&self) -> i64 {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => {
                (end.timestamp_millis() - start.timestamp_millis()).max(0) / 1000
            }
            _ => 0,
        }
    }
}

pub fn new_session_id() -> String {
    format!("call_{}", nanoid::nanoid!())
}

/// Media room shared by both sides of a session.
pub fn room_name(match_id: ObjectId, session_id: &str) -> String {
    format!("room_{}_{}", match_id.to_hex(), session_id)
}
