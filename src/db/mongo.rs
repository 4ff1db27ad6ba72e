//! MongoDB client and collection wrapper
//!
//! Typed collections apply their schema's indexes on open, stamp metadata on
//! insert and hide soft-deleted documents from every read.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::{
    options::{FindOptions, IndexOptions, UpdateModifications},
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::types::error::is_duplicate_key;
use crate::types::FarmError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Trait for schemas keyed by an ObjectId `_id`
pub trait Identified {
    fn id(&self) -> Option<ObjectId>;
    fn set_id(&mut self, id: ObjectId);
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, FarmError> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast instead of hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| FarmError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| FarmError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, FarmError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    /// Create a new collection and apply indexes
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, FarmError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<(), FarmError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| FarmError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, setting metadata timestamps
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId, FarmError> {
        item.mut_metadata().stamp_created(DateTime::now());

        let result = self
            .inner
            .insert_one(item)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    FarmError::Conflict("Duplicate key".into())
                } else {
                    FarmError::Database(format!("Insert failed: {}", e))
                }
            })?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| FarmError::Database("Failed to get inserted ID".into()))
    }

    /// Find one document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, FarmError> {
        self.inner
            .find_one(live(filter))
            .await
            .map_err(|e| FarmError::Database(format!("Find failed: {}", e)))
    }

    /// Find many documents by filter with sort/skip/limit options
    pub async fn find_many(
        &self,
        filter: Document,
        options: Option<FindOptions>,
    ) -> Result<Vec<T>, FarmError> {
        use futures_util::StreamExt;

        let cursor = self
            .inner
            .find(live(filter))
            .with_options(options)
            .await
            .map_err(|e| FarmError::Database(format!("Find failed: {}", e)))?;

        let results: Vec<T> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    /// Count live documents matching a filter
    pub async fn count(&self, filter: Document) -> Result<u64, FarmError> {
        self.inner
            .count_documents(live(filter))
            .await
            .map_err(|e| FarmError::Database(format!("Count failed: {}", e)))
    }

    /// Replace a whole document, bumping `updated_at`.
    ///
    /// Returns false when the filter matched nothing.
    pub async fn replace_one(&self, filter: Document, mut item: T) -> Result<bool, FarmError> {
        item.mut_metadata().updated_at = Some(DateTime::now());

        let result = self
            .inner
            .replace_one(live(filter), item)
            .await
            .map_err(|e| FarmError::Database(format!("Replace failed: {}", e)))?;

        Ok(result.matched_count > 0)
    }

    /// Update one document
    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, FarmError> {
        self.inner
            .update_one(live(filter), update.into())
            .await
            .map_err(|e| FarmError::Database(format!("Update failed: {}", e)))
    }

    /// Soft delete a document
    pub async fn soft_delete(&self, filter: Document) -> Result<UpdateResult, FarmError> {
        let now = DateTime::now();
        let update = doc! {
            "$set": {
                "metadata.is_deleted": true,
                "metadata.deleted_at": now,
                "metadata.updated_at": now,
            }
        };

        self.update_one(filter, update).await
    }

    /// Run an aggregation pipeline over live documents, decoding each result as `R`
    pub async fn aggregate<R>(&self, mut pipeline: Vec<Document>) -> Result<Vec<R>, FarmError>
    where
        R: DeserializeOwned,
    {
        use futures_util::TryStreamExt;

        pipeline.insert(0, doc! { "$match": { "metadata.is_deleted": { "$ne": true } } });

        let cursor = self
            .inner
            .aggregate(pipeline)
            .await
            .map_err(|e| FarmError::Database(format!("Aggregate failed: {}", e)))?;

        let raw: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| FarmError::Database(format!("Aggregate failed: {}", e)))?;

        raw.into_iter()
            .map(|d| bson::from_document(d).map_err(FarmError::from))
            .collect()
    }
}

/// Add the soft-delete guard to a filter
fn live(mut filter: Document) -> Document {
    filter.insert("metadata.is_deleted", doc! { "$ne": true });
    filter
}

/// Escape user input for use inside a `$regex`
pub fn escape_regex(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if "\\^$.|?*+()[]{}/-".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_filter_adds_guard() {
        let filter = live(doc! { "email": "a@b.co" });
        assert_eq!(filter.get_str("email").unwrap(), "a@b.co");
        assert!(filter.get_document("metadata.is_deleted").is_ok());
    }

    #[test]
    fn test_escape_regex() {
        assert_eq!(escape_regex("corn"), "corn");
        assert_eq!(escape_regex("a.b*(c)"), "a\\.b\\*\\(c\\)");
    }

    // Round-trips against a live server need MongoDB; the store tests
    // exercise the same contracts through the in-memory implementation.
}
