use bson::{doc, oid::ObjectId, Document};
use futures::TryStreamExt;
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaoError {
    #[error("Document not found")]
    NotFound,
    #[error("Document was modified concurrently")]
    VersionConflict,
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("BSON serialization error: {0}")]
    BsonSer(#[from] bson::ser::Error),
    #[error("BSON deserialization error: {0}")]
    BsonDe(#[from] bson::de::Error),
}

pub type DaoResult<T> = Result<T, DaoError>;

/// Thin typed wrapper around a MongoDB collection.
pub struct BaseDao<T: Send + Sync> {
    collection: Collection<T>,
}

impl<T> BaseDao<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    pub fn new(db: &Database, name: &str) -> Self {
        Self {
            collection: db.collection::<T>(name),
        }
    }

    pub async fn insert_one(&self, doc: &T) -> DaoResult<()> {
        self.collection.insert_one(doc).await.map_err(map_write_error)?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<T> {
        self.find_one(doc! { "_id": id })
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn find_one(&self, filter: Document) -> DaoResult<Option<T>> {
        Ok(self.collection.find_one(filter).await?)
    }

    pub async fn find_many(
        &self,
        filter: Document,
        sort: Option<Document>,
        limit: Option<i64>,
    ) -> DaoResult<Vec<T>> {
        let mut action = self.collection.find(filter);
        if let Some(sort) = sort {
            action = action.sort(sort);
        }
        if let Some(limit) = limit {
            action = action.limit(limit);
        }
        let cursor = action.await?;
        Ok(cursor.try_collect().await?)
    }

    /// Replaces the document matched by `filter`. Returns how many documents matched.
    pub async fn replace_one(&self, filter: Document, replacement: &T) -> DaoResult<u64> {
        let result = self
            .collection
            .replace_one(filter, replacement)
            .await
            .map_err(map_write_error)?;
        Ok(result.matched_count)
    }
}

fn map_write_error(e: mongodb::error::Error) -> DaoError {
    if let mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref we)) =
        *e.kind
        && we.code == 11000
    {
        return DaoError::DuplicateKey(we.message.clone());
    }
    DaoError::Mongo(e)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PaginationParams {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// Resolves to a 1-based page and a limit clamped to `1..=max_limit`.
    pub fn resolve(&self, default_limit: u64, max_limit: u64) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(default_limit).clamp(1, max_limit.max(1));
        (page, limit)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
    pub has_more: bool,
}

impl<T> PaginatedResult<T> {
    /// Slices an already ordered collection to `[(page-1)*limit, page*limit)`.
    pub fn from_ordered(all: Vec<T>, page: u64, limit: u64) -> Self {
        let total = all.len() as u64;
        let start = page.saturating_sub(1).saturating_mul(limit).min(total) as usize;
        let items: Vec<T> = all.into_iter().skip(start).take(limit as usize).collect();
        let total_pages = total.div_ceil(limit.max(1));
        Self {
            items,
            total,
            page,
            per_page: limit,
            total_pages,
            has_more: page < total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
            has_more: self.has_more,
        }
    }
}
