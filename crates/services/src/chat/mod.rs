//! Match-scoped chat: reading, mutating and moderating the message log of a `Match`.

pub mod access;
pub mod moderation;
pub mod mutation;

use std::sync::Arc;

use bson::{DateTime, oid::ObjectId};
use pawchat_config::ChatSettings;
use pawchat_db::models::Match;
use thiserror::Error;
use tracing::debug;

use crate::clock::Clock;
use crate::dao::base::DaoError;
use crate::dao::match_store::MatchStore;
use crate::notify::{Notifier, RealtimeEvent};

pub use access::{ChatExport, ChatStats, MessagePage, ThreadNode};
pub use moderation::{ModerationAction, ModerationQueueItem};
pub use mutation::SendMessage;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    WindowExpired(String),
    #[error(transparent)]
    Storage(DaoError),
}

impl From<DaoError> for ChatError {
    fn from(err: DaoError) -> Self {
        match err {
            DaoError::NotFound => ChatError::NotFound("Resource".to_string()),
            other => ChatError::Storage(other),
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

/// How a mutation locates the aggregate it works on.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Target {
    Match(ObjectId),
    Message(ObjectId),
}

pub struct ChatService {
    store: Arc<dyn MatchStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: ChatSettings,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn MatchStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn MatchStore> {
        &self.store
    }

    /// Loads a match the caller participates in. Absent and foreign matches are
    /// indistinguishable to the caller.
    pub(crate) async fn load_for(
        &self,
        match_id: ObjectId,
        user_id: ObjectId,
    ) -> ChatResult<Match> {
        match self.store.find_by_id(match_id).await {
            Ok(m) if m.is_participant(user_id) => Ok(m),
            Ok(_) | Err(DaoError::NotFound) => Err(ChatError::NotFound("Match".to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn load(&self, target: Target) -> ChatResult<Match> {
        let loaded = match target {
            Target::Match(id) => self.store.find_by_id(id).await,
            Target::Message(id) => self.store.find_by_message_id(id).await,
        };
        loaded.map_err(|e| match (e, target) {
            (DaoError::NotFound, Target::Match(_)) => ChatError::NotFound("Match".to_string()),
            (DaoError::NotFound, Target::Message(_)) => ChatError::NotFound("Message".to_string()),
            (e, _) => e.into(),
        })
    }

    /// Read-modify-write of one aggregate.
    ///
    /// `apply` runs against a freshly loaded copy with the current time. When the
    /// save loses a version race the whole cycle runs again, up to
    /// `max_save_retries` extra times.
    pub(crate) async fn modify<T, F>(&self, target: Target, mut apply: F) -> ChatResult<(Match, T)>
    where
        F: FnMut(&mut Match, DateTime) -> ChatResult<T>,
    {
        let mut attempt = 0;
        loop {
            let mut aggregate = self.load(target).await?;
            let out = apply(&mut aggregate, self.clock.now())?;
            match self.store.save(&mut aggregate).await {
                Ok(()) => return Ok((aggregate, out)),
                Err(DaoError::VersionConflict) if attempt < self.settings.max_save_retries => {
                    attempt += 1;
                    debug!(match_id = %aggregate.id, attempt, "Version conflict, retrying");
                }
                Err(e) => return Err(ChatError::Storage(e)),
            }
        }
    }

    pub(crate) fn notify(&self, recipients: &[ObjectId], event: RealtimeEvent) {
        self.notifier.dispatch(recipients, event);
    }
}

/// Rejects callers outside the match with the same answer as a missing message.
pub(crate) fn require_participant(m: &Match, user_id: ObjectId) -> ChatResult<ObjectId> {
    m.counterpart(user_id)
        .ok_or_else(|| ChatError::NotFound("Message".to_string()))
}
