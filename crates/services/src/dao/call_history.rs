use async_trait::async_trait;
use bson::{doc, oid::ObjectId};
use dashmap::DashMap;
use mongodb::Database;
use pawchat_db::models::CallHistoryEntry;

use super::base::{BaseDao, DaoError, DaoResult};

/// Durable record of finished calls, queried newest-first per match.
#[async_trait]
pub trait CallHistoryStore: Send + Sync {
    async fn insert(&self, entry: &CallHistoryEntry) -> DaoResult<()>;
    async fn list_for_match(&self, match_id: ObjectId, limit: usize)
    -> DaoResult<Vec<CallHistoryEntry>>;
}

pub struct MongoCallHistoryStore {
    pub base: BaseDao<CallHistoryEntry>,
}

impl MongoCallHistoryStore {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, CallHistoryEntry::COLLECTION),
        }
    }
}

#[async_trait]
impl CallHistoryStore for MongoCallHistoryStore {
    async fn insert(&self, entry: &CallHistoryEntry) -> DaoResult<()> {
        self.base.insert_one(entry).await
    }

    async fn list_for_match(
        &self,
        match_id: ObjectId,
        limit: usize,
    ) -> DaoResult<Vec<CallHistoryEntry>> {
        self.base
            .find_many(
                doc! { "match_id": match_id },
                Some(doc! { "ended_at": -1 }),
                Some(limit as i64),
            )
            .await
    }
}

#[derive(Default)]
pub struct InMemoryCallHistoryStore {
    entries: DashMap<ObjectId, Vec<CallHistoryEntry>>,
}

impl InMemoryCallHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CallHistoryStore for InMemoryCallHistoryStore {
    async fn insert(&self, entry: &CallHistoryEntry) -> DaoResult<()> {
        let mut bucket = self.entries.entry(entry.match_id).or_default();
        if bucket.iter().any(|e| e.session_id == entry.session_id) {
            return Err(DaoError::DuplicateKey(entry.session_id.clone()));
        }
        let mut entry = entry.clone();
        entry.id.get_or_insert_with(ObjectId::new);
        bucket.push(entry);
        Ok(())
    }

    async fn list_for_match(
        &self,
        match_id: ObjectId,
        limit: usize,
    ) -> DaoResult<Vec<CallHistoryEntry>> {
        let mut entries = self
            .entries
            .get(&match_id)
            .map(|b| b.clone())
            .unwrap_or_default();
        entries.sort_by(|a, b| b.ended_at.cmp(&a.ended_at));
        entries.truncate(limit);
        Ok(entries)
    }
}
