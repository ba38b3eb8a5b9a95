//! MongoDB client and store adapter

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Document};
use futures_util::StreamExt;
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::{options::IndexOptions, Client, IndexModel};
use tracing::{error, info};

use super::store::{DocumentStore, UpdateCounts};
use crate::types::{AgroError, Result};

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify the deployment answers a ping
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Keep startup from hanging on an unreachable server
        let separator = if uri.contains('?') { '&' } else { '?' };
        let timeout_uri = format!(
            "{}{}serverSelectionTimeoutMS=3000&connectTimeoutMS=3000",
            uri, separator
        );

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| AgroError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| AgroError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Create the indexes a schema declares on its collection
    pub async fn apply_indexes<T: IntoIndexes>(&self, collection: &str) -> Result<()> {
        let schema_indices = T::into_indices();
        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.raw(collection)
            .create_indexes(indices)
            .await
            .map_err(|e| {
                AgroError::Database(format!("Failed to create indexes on '{}': {}", collection, e))
            })?;

        Ok(())
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    fn raw(&self, collection: &str) -> mongodb::Collection<Document> {
        self.client.database(&self.db_name).collection(collection)
    }
}

#[async_trait]
impl DocumentStore for MongoClient {
    fn kind(&self) -> &'static str {
        "mongodb"
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<ObjectId> {
        let result = self
            .raw(collection)
            .insert_one(doc)
            .await
            .map_err(|e| write_failure("Insert", e))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| AgroError::Database("Failed to get inserted ID".into()))
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        self.raw(collection)
            .find_one(filter)
            .await
            .map_err(|e| AgroError::Database(format!("Find failed: {}", e)))
    }

    async fn find_many(&self, collection: &str, filter: Document) -> Result<Vec<Document>> {
        let cursor = self
            .raw(collection)
            .find(filter)
            .await
            .map_err(|e| AgroError::Database(format!("Find failed: {}", e)))?;

        let results: Vec<Document> = cursor
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

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateCounts> {
        let result = self
            .raw(collection)
            .update_one(filter, update)
            .await
            .map_err(|e| write_failure("Update", e))?;

        Ok(UpdateCounts {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64> {
        let result = self
            .raw(collection)
            .delete_one(filter)
            .await
            .map_err(|e| AgroError::Database(format!("Delete failed: {}", e)))?;

        Ok(result.deleted_count)
    }
}

/// Server code for a unique index violation
const DUPLICATE_KEY: i32 = 11000;

/// Map a failed write. A unique index violation means another request
/// stored the same key first, so it is reported as a conflict.
fn write_failure(op: &str, err: MongoError) -> AgroError {
    let code = match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) => Some(write.code),
        _ => None,
    };
    classify_write_error(op, code, &err)
}

fn classify_write_error(op: &str, code: Option<i32>, detail: &dyn std::fmt::Display) -> AgroError {
    match code {
        Some(DUPLICATE_KEY) => {
            AgroError::Conflict("Ya existe un registro con ese valor único.".into())
        }
        _ => AgroError::Database(format!("{} failed: {}", op, detail)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_key_is_a_conflict() {
        let err = classify_write_error("Insert", Some(DUPLICATE_KEY), &"E11000 duplicate key");
        assert!(matches!(err, AgroError::Conflict(_)));

        let err = classify_write_error("Update", Some(121), &"Document failed validation");
        assert!(matches!(err, AgroError::Database(m) if m.starts_with("Update failed")));

        let err = classify_write_error("Insert", None, &"connection reset");
        assert!(matches!(err, AgroError::Database(_)));
    }
}
