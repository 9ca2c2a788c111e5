use mongodb::bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use std::sync::Arc;

use super::record::{normalize, normalize_all, Record};
use super::store::{DocumentStore, FindOptions};
use crate::utils::AppError;

/// CRUD over named collections with timestamping and `_id` -> `id`
/// normalization. Every store failure comes back as `AppError::Store`
/// naming the collection; "not found" is never an error.
#[derive(Clone)]
pub struct QueryHelper {
    store: Arc<dyn DocumentStore>,
}

impl QueryHelper {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        self.store
            .ping()
            .await
            .map_err(|e| AppError::store("admin", "ping", e))
    }

    pub async fn insert_one(&self, collection: &str, mut document: Document) -> Result<Record, AppError> {
        let now = DateTime::now();
        document.insert("created_on", now);
        document.insert("last_updated_on", now);

        let id = self
            .store
            .insert_one(collection, document)
            .await
            .map_err(|e| AppError::store(collection, "insert_one", e))?;

        let stored = self
            .store
            .find_one(collection, doc! { "_id": id.clone() })
            .await
            .map_err(|e| AppError::store(collection, "insert_one", e))?;

        match stored {
            Some(doc) => Ok(normalize(doc)),
            // Only reachable if the document vanished between write and read.
            None => Err(AppError::NotFound(format!(
                "Inserted document {} not found in '{}'",
                id, collection
            ))),
        }
    }

    pub async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Record>, AppError> {
        let found = self
            .store
            .find_one(collection, filter)
            .await
            .map_err(|e| AppError::store(collection, "find_one", e))?;
        Ok(found.map(normalize))
    }

    /// Newest first, first ten by default; see `FindOptions`.
    pub async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> Result<Vec<Record>, AppError> {
        let docs = self
            .store
            .find(collection, filter, options)
            .await
            .map_err(|e| AppError::store(collection, "find", e))?;
        Ok(normalize_all(docs))
    }

    pub async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        mut patch: Document,
        upsert: bool,
    ) -> Result<Option<Record>, AppError> {
        let now = DateTime::now();
        patch.insert("last_updated_on", now);

        let updated = self
            .store
            .find_one_and_update(collection, filter, patch, doc! { "created_on": now }, upsert)
            .await
            .map_err(|e| AppError::store(collection, "update_one", e))?;
        Ok(updated.map(normalize))
    }

    /// Returns every document matching `filter` after the update. A patch
    /// that changes a filtered field can therefore shrink the result.
    pub async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        mut patch: Document,
    ) -> Result<Vec<Record>, AppError> {
        patch.insert("last_updated_on", DateTime::now());

        self.store
            .update_many(collection, filter.clone(), patch)
            .await
            .map_err(|e| AppError::store(collection, "update_many", e))?;

        let docs = self
            .store
            .find(collection, filter, FindOptions::all())
            .await
            .map_err(|e| AppError::store(collection, "update_many", e))?;
        Ok(normalize_all(docs))
    }

    pub async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64, AppError> {
        self.store
            .delete_one(collection, filter)
            .await
            .map_err(|e| AppError::store(collection, "delete_one", e))
    }

    pub async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64, AppError> {
        self.store
            .delete_many(collection, filter)
            .await
            .map_err(|e| AppError::store(collection, "delete_many", e))
    }

    /// Flags the first match with `is_deleted: true`. Reads do not filter
    /// flagged documents; callers must.
    pub async fn soft_delete_one(&self, collection: &str, filter: Document) -> Result<Option<Record>, AppError> {
        self.update_one(collection, filter, doc! { "is_deleted": true }, false)
            .await
    }

    pub async fn count_documents(&self, collection: &str, filter: Document) -> Result<u64, AppError> {
        self.store
            .count_documents(collection, filter)
            .await
            .map_err(|e| AppError::store(collection, "count_documents", e))
    }

    pub async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Record>, AppError> {
        let docs = self
            .store
            .aggregate(collection, pipeline)
            .await
            .map_err(|e| AppError::store(collection, "aggregate", e))?;
        Ok(normalize_all(docs))
    }

    pub async fn bulk_insert(&self, collection: &str, documents: Vec<Document>) -> Result<Vec<Record>, AppError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let stamped: Vec<Document> = documents
            .into_iter()
            .map(|mut doc| {
                let now = DateTime::now();
                doc.insert("created_on", now);
                doc.insert("last_updated_on", now);
                doc
            })
            .collect();

        let ids = self
            .store
            .insert_many(collection, stamped)
            .await
            .map_err(|e| AppError::store(collection, "bulk_insert", e))?;

        let docs = self
            .store
            .find(collection, doc! { "_id": { "$in": ids } }, FindOptions::all())
            .await
            .map_err(|e| AppError::store(collection, "bulk_insert", e))?;
        Ok(normalize_all(docs))
    }

    /// Parses a public `id` back into a store identifier.
    pub fn object_id(id: &str) -> Result<ObjectId, AppError> {
        if id.is_empty() {
            return Err(AppError::Validation(
                "Invalid ID format: ID must be a non-empty string".to_string(),
            ));
        }
        if id.len() != 24 || !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AppError::Validation(format!(
                "Invalid ObjectId format: '{}' is not a valid 24-character hex string",
                id
            )));
        }
        ObjectId::parse_str(id)
            .map_err(|e| AppError::Validation(format!("Error converting id '{}' to ObjectId: {}", id, e)))
    }

    /// Filter matching a single record by its public `id`.
    pub fn id_filter(id: &str) -> Result<Document, AppError> {
        Ok(doc! { "_id": Bson::ObjectId(Self::object_id(id)?) })
    }
}
