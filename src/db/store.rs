//! Document store abstraction
//!
//! Services talk to collections of BSON documents through [`DocumentStore`],
//! which both the MongoDB adapter and the in-memory store implement. All
//! mutations are single-document and atomic; update documents use the
//! MongoDB operator syntax (`$set`, `$push`, `$pull`, positional `arr.$.f`).

use async_trait::async_trait;
use bson::{oid::ObjectId, Document};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::error;

use crate::types::Result;

/// Match/modify counts reported by an update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateCounts {
    pub matched: u64,
    pub modified: u64,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short name of the backend, reported by `/health`
    fn kind(&self) -> &'static str;

    /// Insert a document. An `_id` is generated when absent.
    async fn insert_one(&self, collection: &str, doc: Document) -> Result<ObjectId>;

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>>;

    async fn find_many(&self, collection: &str, filter: Document) -> Result<Vec<Document>>;

    /// Apply `update` to the first document matching `filter`
    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateCounts>;

    /// Remove the first document matching `filter`, returning the number removed
    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64>;
}

/// Typed view over one named collection
pub struct Collection<T> {
    store: Arc<dyn DocumentStore>,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            name: self.name,
            _marker: PhantomData,
        }
    }
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<dyn DocumentStore>, name: &'static str) -> Self {
        Self {
            store,
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn insert_one(&self, item: &T) -> Result<ObjectId> {
        let doc = bson::to_document(item)?;
        self.store.insert_one(self.name, doc).await
    }

    /// Find one document and decode it.
    ///
    /// A stored document that no longer fits `T` is an internal fault.
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        match self.store.find_one(self.name, filter).await? {
            Some(doc) => Ok(Some(bson::from_document(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn find_one_raw(&self, filter: Document) -> Result<Option<Document>> {
        self.store.find_one(self.name, filter).await
    }

    /// Find and decode many documents, skipping the ones that fail to decode
    pub async fn find_many(&self, filter: Document) -> Result<Vec<T>> {
        let docs = self.store.find_many(self.name, filter).await?;
        Ok(docs
            .into_iter()
            .filter_map(|doc| match bson::from_document::<T>(doc) {
                Ok(item) => Some(item),
                Err(e) => {
                    error!("Error reading document from '{}': {}", self.name, e);
                    None
                }
            })
            .collect())
    }

    pub async fn find_many_raw(&self, filter: Document) -> Result<Vec<Document>> {
        self.store.find_many(self.name, filter).await
    }

    pub async fn exists(&self, filter: Document) -> Result<bool> {
        Ok(self.store.find_one(self.name, filter).await?.is_some())
    }

    pub async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateCounts> {
        self.store.update_one(self.name, filter, update).await
    }

    pub async fn delete_one(&self, filter: Document) -> Result<u64> {
        self.store.delete_one(self.name, filter).await
    }
}
