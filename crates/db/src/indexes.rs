use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::{CallHistoryEntry, Match};

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Matches (messages are embedded, so lookups by message id go through the array index)
    create_indexes(
        db,
        Match::COLLECTION,
        vec![
            index(bson::doc! { "user1": 1, "status": 1 }),
            index(bson::doc! { "user2": 1, "status": 1 }),
            index(bson::doc! { "messages._id": 1 }),
            index(bson::doc! { "messages.moderation_status": 1 }),
        ],
    )
    .await?;

    // Call history
    create_indexes(
        db,
        CallHistoryEntry::COLLECTION,
        vec![
            index_unique(bson::doc! { "session_id": 1 }),
            index(bson::doc! { "match_id": 1, "ended_at": -1 }),
        ],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    let coll = db.collection::<bson::Document>(collection);
    match coll.create_indexes(indexes.clone()).await {
        Ok(_) => {
            info!(collection, "Indexes created");
            Ok(())
        }
        Err(e) => {
            // IndexKeySpecsConflict (code 86): same name, different options.
            if let mongodb::error::ErrorKind::Command(ref cmd_err) = *e.kind
                && cmd_err.code == 86
            {
                tracing::warn!(
                    collection,
                    "Index conflict detected, dropping conflicting indexes and retrying"
                );
                coll.drop_indexes().await?;
                coll.create_indexes(indexes).await?;
                info!(collection, "Indexes recreated after conflict resolution");
                return Ok(());
            }
            Err(e)
        }
    }
}
