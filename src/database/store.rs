use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};

use crate::utils::BackendError;

pub type BackendResult<T> = Result<T, BackendError>;

/// Paging and ordering for multi-document reads.
#[derive(Debug, Clone, PartialEq)]
pub struct FindOptions {
    pub skip: u64,
    /// `None` reads every match.
    pub limit: Option<i64>,
    pub sort: Document,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: Some(10),
            sort: doc! { "created_on": -1 },
        }
    }
}

impl FindOptions {
    /// Every match, newest first.
    pub fn all() -> Self {
        Self {
            limit: None,
            ..Self::default()
        }
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = sort;
        self
    }
}

/// Raw document operations against named collections. Documents cross this
/// boundary un-normalized (with `_id`).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns the assigned `_id`.
    async fn insert_one(&self, collection: &str, doc: Document) -> BackendResult<Bson>;

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> BackendResult<Vec<Bson>>;

    async fn find_one(&self, collection: &str, filter: Document) -> BackendResult<Option<Document>>;

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> BackendResult<Vec<Document>>;

    /// `$set`-merges `set` into the first match and returns the document after
    /// the update. `on_insert` is applied only when an upsert creates one.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        set: Document,
        on_insert: Document,
        upsert: bool,
    ) -> BackendResult<Option<Document>>;

    /// Returns the number of matched documents.
    async fn update_many(&self, collection: &str, filter: Document, set: Document) -> BackendResult<u64>;

    async fn delete_one(&self, collection: &str, filter: Document) -> BackendResult<u64>;

    async fn delete_many(&self, collection: &str, filter: Document) -> BackendResult<u64>;

    async fn count_documents(&self, collection: &str, filter: Document) -> BackendResult<u64>;

    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> BackendResult<Vec<Document>>;

    async fn ping(&self) -> BackendResult<()>;
}
