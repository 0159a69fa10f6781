use async_trait::async_trait;
use bson::{doc, oid::ObjectId};
use dashmap::DashMap;
use mongodb::Database;
use pawchat_db::models::{Match, MatchStatus, ModerationStatus};

use super::base::{BaseDao, DaoError, DaoResult};

/// Persistence for the `Match` aggregate.
///
/// Every write replaces the whole document. `save` is guarded by
/// `Match::version`: it fails with `DaoError::VersionConflict` when the stored
/// version moved since the aggregate was loaded, and bumps the version on success.
#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn insert(&self, m: &Match) -> DaoResult<()>;
    async fn find_by_id(&self, match_id: ObjectId) -> DaoResult<Match>;
    async fn find_by_message_id(&self, message_id: ObjectId) -> DaoResult<Match>;
    async fn find_for_user(
        &self,
        user_id: ObjectId,
        status: Option<MatchStatus>,
    ) -> DaoResult<Vec<Match>>;
    async fn find_with_moderation_status(&self, status: ModerationStatus)
    -> DaoResult<Vec<Match>>;
    async fn save(&self, m: &mut Match) -> DaoResult<()>;
}

pub struct MongoMatchStore {
    pub base: BaseDao<Match>,
}

impl MongoMatchStore {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Match::COLLECTION),
        }
    }
}

#[async_trait]
impl MatchStore for MongoMatchStore {
    async fn insert(&self, m: &Match) -> DaoResult<()> {
        self.base.insert_one(m).await
    }

    async fn find_by_id(&self, match_id: ObjectId) -> DaoResult<Match> {
        self.base.find_by_id(match_id).await
    }

    async fn find_by_message_id(&self, message_id: ObjectId) -> DaoResult<Match> {
        self.base
            .find_one(doc! { "messages._id": message_id })
            .await?
            .ok_or(DaoError::NotFound)
    }

    async fn find_for_user(
        &self,
        user_id: ObjectId,
        status: Option<MatchStatus>,
    ) -> DaoResult<Vec<Match>> {
        let mut filter = doc! { "$or": [{ "user1": user_id }, { "user2": user_id }] };
        if let Some(status) = status {
            filter.insert("status", bson::to_bson(&status)?);
        }
        self.base
            .find_many(filter, Some(doc! { "last_activity": -1 }), None)
            .await
    }

    async fn find_with_moderation_status(
        &self,
        status: ModerationStatus,
    ) -> DaoResult<Vec<Match>> {
        self.base
            .find_many(
                doc! { "messages.moderation_status": status.as_str() },
                Some(doc! { "last_activity": -1 }),
                None,
            )
            .await
    }

    async fn save(&self, m: &mut Match) -> DaoResult<()> {
        let expected = m.version;
        m.version = expected + 1;
        let matched = self
            .base
            .replace_one(doc! { "_id": m.id, "version": expected }, m)
            .await;
        match matched {
            Ok(1) => Ok(()),
            Ok(_) => {
                m.version = expected;
                Err(DaoError::VersionConflict)
            }
            Err(e) => {
                m.version = expected;
                Err(e)
            }
        }
    }
}

/// Process-local store, used by tests and `database.backend = "memory"`.
#[derive(Default)]
pub struct InMemoryMatchStore {
    matches: DashMap<ObjectId, Match>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn insert(&self, m: &Match) -> DaoResult<()> {
        if self.matches.contains_key(&m.id) {
            return Err(DaoError::DuplicateKey(m.id.to_hex()));
        }
        self.matches.insert(m.id, m.clone());
        Ok(())
    }

    async fn find_by_id(&self, match_id: ObjectId) -> DaoResult<Match> {
        self.matches
            .get(&match_id)
            .map(|m| m.clone())
            .ok_or(DaoError::NotFound)
    }

    async fn find_by_message_id(&self, message_id: ObjectId) -> DaoResult<Match> {
        self.matches
            .iter()
            .find(|m| m.messages.contains(message_id))
            .map(|m| m.clone())
            .ok_or(DaoError::NotFound)
    }

    async fn find_for_user(
        &self,
        user_id: ObjectId,
        status: Option<MatchStatus>,
    ) -> DaoResult<Vec<Match>> {
        let mut found: Vec<Match> = self
            .matches
            .iter()
            .filter(|m| m.is_participant(user_id))
            .filter(|m| status.is_none_or(|s| m.status == s))
            .map(|m| m.clone())
            .collect();
        found.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(found)
    }

    async fn find_with_moderation_status(
        &self,
        status: ModerationStatus,
    ) -> DaoResult<Vec<Match>> {
        let mut found: Vec<Match> = self
            .matches
            .iter()
            .filter(|m| m.messages.iter().any(|msg| msg.moderation_status == status))
            .map(|m| m.clone())
            .collect();
        found.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(found)
    }

    async fn save(&self, m: &mut Match) -> DaoResult<()> {
        let mut stored = self.matches.get_mut(&m.id).ok_or(DaoError::NotFound)?;
        if stored.version != m.version {
            return Err(DaoError::VersionConflict);
        }
        m.version += 1;
        *stored = m.clone();
        Ok(())
    }
}
