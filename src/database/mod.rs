pub mod memory;
pub mod query_helper;
pub mod record;
pub mod store;

pub use memory::MemoryStore;
pub use query_helper::QueryHelper;
pub use record::*;
pub use store::*;

use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use std::error::Error;
use std::time::Duration;

pub const USERS: &str = "users";
pub const STORYBOARDS: &str = "storyboards";

#[derive(Clone)]
pub struct MongoDB {
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, Box<dyn Error>> {
        let mut client_options = ClientOptions::parse(uri).await?;

        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(5);
        client_options.max_idle_time = Some(Duration::from_secs(300));

        client_options.connect_timeout = Some(Duration::from_secs(5));
        client_options.server_selection_timeout = Some(Duration::from_secs(5));

        let client = Client::with_options(client_options)?;
        let db = client.database(db_name);

        // Test connection
        db.list_collection_names().await?;

        let mongodb = Self { db };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Unique username backs the signup conflict check; the storyboard index
    /// serves the per-user newest-first listing.
    async fn ensure_indexes(&self) -> Result<(), Box<dyn Error>> {
        log::info!("🔧 Creating database indexes...");

        let users = self.collection::<Document>(USERS);
        let username_index = IndexModel::builder()
            .keys(doc! { "username": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        match users.create_index(username_index).await {
            Ok(_) => log::info!("   ✅ Index created: users(username) unique"),
            Err(e) => log::warn!("   ⚠️  Could not create unique users(username) index: {}", e),
        }

        let storyboards = self.collection::<Document>(STORYBOARDS);
        let storyboard_index = IndexModel::builder()
            .keys(doc! { "username": 1, "created_on": -1 })
            .build();

        match storyboards.create_index(storyboard_index).await {
            Ok(_) => log::info!("   ✅ Index created: storyboards(username, created_on)"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        log::info!("✅ Database indexes ready");

        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }
}

#[async_trait]
impl DocumentStore for MongoDB {
    async fn insert_one(&self, collection: &str, doc: Document) -> BackendResult<Bson> {
        let result = self.collection::<Document>(collection).insert_one(doc).await?;
        Ok(result.inserted_id)
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> BackendResult<Vec<Bson>> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }
        let result = self.collection::<Document>(collection).insert_many(docs).await?;
        let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(index, _)| *index);
        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    async fn find_one(&self, collection: &str, filter: Document) -> BackendResult<Option<Document>> {
        Ok(self.collection::<Document>(collection).find_one(filter).await?)
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> BackendResult<Vec<Document>> {
        let coll = self.collection::<Document>(collection);
        let mut action = coll.find(filter).sort(options.sort).skip(options.skip);
        if let Some(limit) = options.limit {
            action = action.limit(limit);
        }
        let cursor = action.await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        Ok(docs)
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        set: Document,
        on_insert: Document,
        upsert: bool,
    ) -> BackendResult<Option<Document>> {
        let mut update = doc! { "$set": set };
        if upsert && !on_insert.is_empty() {
            update.insert("$setOnInsert", on_insert);
        }
        let updated = self
            .collection::<Document>(collection)
            .find_one_and_update(filter, update)
            .upsert(upsert)
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated)
    }

    async fn update_many(&self, collection: &str, filter: Document, set: Document) -> BackendResult<u64> {
        let result = self
            .collection::<Document>(collection)
            .update_many(filter, doc! { "$set": set })
            .await?;
        Ok(result.matched_count)
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> BackendResult<u64> {
        let result = self.collection::<Document>(collection).delete_one(filter).await?;
        Ok(result.deleted_count)
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> BackendResult<u64> {
        let result = self.collection::<Document>(collection).delete_many(filter).await?;
        Ok(result.deleted_count)
    }

    async fn count_documents(&self, collection: &str, filter: Document) -> BackendResult<u64> {
        Ok(self.collection::<Document>(collection).count_documents(filter).await?)
    }

    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> BackendResult<Vec<Document>> {
        let cursor = self.collection::<Document>(collection).aggregate(pipeline).await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        Ok(docs)
    }

    async fn ping(&self) -> BackendResult<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::DateTime;

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_mongodb_connection() {
        dotenv::dotenv().ok();
        let uri = std::env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let db = MongoDB::new(&uri, "storyboard_service_test").await;
        assert!(db.is_ok());
        assert!(db.unwrap().ping().await.is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_mongodb_find_newest_first() {
        dotenv::dotenv().ok();
        let uri = std::env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let db = MongoDB::new(&uri, "storyboard_service_test").await.unwrap();
        let name = "find_newest_first";
        db.delete_many(name, doc! {}).await.unwrap();
        for n in 0..3 {
            let stamp = DateTime::from_millis(1_700_000_000_000 + n);
            db.insert_one(name, doc! { "n": n, "created_on": stamp }).await.unwrap();
        }

        let docs = db.find(name, doc! {}, FindOptions::default().limit(2)).await.unwrap();
        let ns: Vec<i64> = docs.iter().map(|d| d.get_i64("n").unwrap()).collect();
        assert_eq!(ns, vec![2, 1]);
        db.delete_many(name, doc! {}).await.unwrap();
    }
}
