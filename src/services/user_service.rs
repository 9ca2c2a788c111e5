// ==================== USER ACCOUNTS ====================
// Signup, login, listing and removal of accounts in the `users` collection.
// Passwords are stored and compared as given.

use mongodb::bson::{self, doc};
use serde_json::json;

use crate::{
    database::{record_to_json, records_to_json, FindOptions, QueryHelper, Record, USERS},
    models::{ApiResponse, LoginRequest, SignupRequest},
    utils::AppError,
};

const ADMIN_USERNAME: &str = "admin";

/// Stored records minus the credential.
fn public_user(mut record: Record) -> Record {
    record.remove("password");
    record
}

pub async fn signup(db: &QueryHelper, user: SignupRequest) -> ApiResponse {
    if let Err(e) = user.validate() {
        log::warn!("❌ Signup rejected: {}", e);
        return e.into();
    }

    match db.find_one(USERS, doc! { "username": user.username.as_str() }).await {
        Ok(Some(_)) => {
            log::warn!("❌ Signup failed: username '{}' already exists", user.username);
            return AppError::Conflict("Username already exists".to_string()).into();
        }
        Ok(None) => {}
        Err(e) => {
            log::error!("❌ Signup lookup failed: {}", e);
            return e.into();
        }
    }

    let document = match bson::to_document(&user) {
        Ok(document) => document,
        Err(e) => {
            log::error!("❌ Could not encode signup for '{}': {}", user.username, e);
            return ApiResponse::error(400, "Invalid signup payload").with_detail(e.to_string());
        }
    };

    match db.insert_one(USERS, document).await {
        Ok(created) => {
            log::info!("✅ User created: {}", user.username);
            ApiResponse::success(
                201,
                "User created successfully",
                json!({ "user": record_to_json(&public_user(created)) }),
            )
        }
        // A concurrent signup won the unique index.
        Err(e) if e.is_duplicate_key() => {
            log::warn!("❌ Signup failed: username '{}' already exists", user.username);
            AppError::Conflict("Username already exists".to_string()).into()
        }
        Err(e) => {
            log::error!("❌ Signup insert failed for '{}': {}", user.username, e);
            // Existing clients expect 404 here.
            ApiResponse::error(404, "Signup failed").with_detail(e.detail())
        }
    }
}

pub async fn login(db: &QueryHelper, credentials: LoginRequest) -> ApiResponse {
    let filter = doc! {
        "username": credentials.username.as_str(),
        "password": credentials.password.as_str(),
    };

    match db.find_one(USERS, filter).await {
        Ok(Some(user)) => {
            log::info!("✅ Login successful: {}", credentials.username);
            ApiResponse::success(
                200,
                "Login successful",
                json!({ "user": record_to_json(&public_user(user)) }),
            )
        }
        Ok(None) => {
            log::warn!("❌ Login failed: {}", credentials.username);
            AppError::Auth("Invalid credentials".to_string()).into()
        }
        Err(e) => {
            log::error!("❌ Login lookup failed: {}", e);
            e.into()
        }
    }
}

pub async fn list_users(db: &QueryHelper) -> ApiResponse {
    let filter = doc! { "username": { "$ne": ADMIN_USERNAME } };

    match db.find(USERS, filter, FindOptions::all()).await {
        Ok(users) if users.is_empty() => ApiResponse::error(404, "No users found"),
        Ok(users) => {
            let users: Vec<Record> = users.into_iter().map(public_user).collect();
            log::info!("✅ Listed {} users", users.len());
            ApiResponse::success(
                200,
                "Users retrieved successfully",
                json!({ "users": records_to_json(&users) }),
            )
        }
        Err(e) => {
            log::error!("❌ Listing users failed: {}", e);
            e.into()
        }
    }
}

pub async fn delete_user(db: &QueryHelper, username: &str) -> ApiResponse {
    let filter = doc! { "username": username };

    match db.find_one(USERS, filter.clone()).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            log::warn!("❌ Delete failed: user '{}' not found", username);
            return AppError::NotFound("User not found".to_string()).into();
        }
        Err(e) => {
            log::error!("❌ Delete lookup failed: {}", e);
            return e.into();
        }
    }

    match db.delete_one(USERS, filter).await {
        Ok(deleted) => {
            log::info!("🗑️  Deleted user '{}' ({} document)", username, deleted);
            ApiResponse::success(200, "User deleted successfully", serde_json::Value::Null)
        }
        Err(e) => {
            log::error!("❌ Delete failed for '{}': {}", username, e);
            e.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{BackendResult, DocumentStore, MemoryStore};
    use crate::utils::BackendError;
    use async_trait::async_trait;
    use mongodb::bson::{Bson, Document};
    use std::sync::Arc;

    /// Wraps the memory store to replay failure modes a live database shows:
    /// a lookup that misses a concurrent insert, or a failing write.
    struct ScriptedStore {
        inner: MemoryStore,
        blind_lookups: bool,
        fail_inserts: bool,
    }

    #[async_trait]
    impl DocumentStore for ScriptedStore {
        async fn insert_one(&self, collection: &str, doc: Document) -> BackendResult<Bson> {
            if self.fail_inserts {
                return Err(BackendError::Unsupported("write rejected".into()));
            }
            self.inner.insert_one(collection, doc).await
        }
        async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> BackendResult<Vec<Bson>> {
            self.inner.insert_many(collection, docs).await
        }
        async fn find_one(&self, collection: &str, filter: Document) -> BackendResult<Option<Document>> {
            if self.blind_lookups && !filter.contains_key("_id") {
                return Ok(None);
            }
            self.inner.find_one(collection, filter).await
        }
        async fn find(&self, collection: &str, filter: Document, options: FindOptions) -> BackendResult<Vec<Document>> {
            self.inner.find(collection, filter, options).await
        }
        async fn find_one_and_update(
            &self,
            collection: &str,
            filter: Document,
            set: Document,
            on_insert: Document,
            upsert: bool,
        ) -> BackendResult<Option<Document>> {
            self.inner.find_one_and_update(collection, filter, set, on_insert, upsert).await
        }
        async fn update_many(&self, collection: &str, filter: Document, set: Document) -> BackendResult<u64> {
            self.inner.update_many(collection, filter, set).await
        }
        async fn delete_one(&self, collection: &str, filter: Document) -> BackendResult<u64> {
            self.inner.delete_one(collection, filter).await
        }
        async fn delete_many(&self, collection: &str, filter: Document) -> BackendResult<u64> {
            self.inner.delete_many(collection, filter).await
        }
        async fn count_documents(&self, collection: &str, filter: Document) -> BackendResult<u64> {
            self.inner.count_documents(collection, filter).await
        }
        async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> BackendResult<Vec<Document>> {
            self.inner.aggregate(collection, pipeline).await
        }
        async fn ping(&self) -> BackendResult<()> {
            self.inner.ping().await
        }
    }

    async fn scripted(blind_lookups: bool, fail_inserts: bool) -> QueryHelper {
        QueryHelper::new(Arc::new(ScriptedStore {
            inner: MemoryStore::with_default_indexes().await,
            blind_lookups,
            fail_inserts,
        }))
    }

    async fn helper() -> QueryHelper {
        QueryHelper::new(Arc::new(MemoryStore::with_default_indexes().await))
    }

    fn signup_request(username: &str, password: &str) -> SignupRequest {
        SignupRequest {
            username: username.into(),
            password: password.into(),
            email: Some(format!("{}@studio.com", username)),
            phone: None,
            ad_agency_name: Some("Acme Ads".into()),
        }
    }

    fn login_request(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn test_signup_creates_user() {
        let db = helper().await;
        let resp = signup(&db, signup_request("ana", "pw")).await;
        assert_eq!(resp.code(), 201);

        let ApiResponse::Success(body) = resp else {
            panic!("expected success");
        };
        let user = &body.data["user"];
        assert_eq!(user["username"], "ana");
        assert_eq!(user["ad_agency_name"], "Acme Ads");
        assert!(user["id"].is_string());
        assert!(user["created_on"].is_string());
        assert!(user.get("password").is_none());
        assert!(user.get("phone").is_none());

        let stored = db.find_one(USERS, doc! { "username": "ana" }).await.unwrap().unwrap();
        assert_eq!(stored.get_str("password").unwrap(), "pw");
    }

    #[tokio::test]
    async fn test_signup_duplicate_is_conflict() {
        let db = helper().await;
        assert!(signup(&db, signup_request("ana", "pw")).await.is_success());

        let resp = signup(&db, signup_request("ana", "other")).await;
        assert!(!resp.is_success());
        assert_eq!(resp.code(), 409);
        let ApiResponse::Error(body) = resp else {
            panic!("expected error");
        };
        assert_eq!(body.errors[0].message, "Username already exists");
        assert_eq!(db.count_documents(USERS, doc! {}).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_signup_rejects_bad_email() {
        let db = helper().await;
        let mut req = signup_request("ana", "pw");
        req.email = Some("not-an-email".into());
        let resp = signup(&db, req).await;
        assert_eq!(resp.code(), 400);
        assert_eq!(db.count_documents(USERS, doc! {}).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_login() {
        let db = helper().await;
        signup(&db, signup_request("ana", "pw")).await;

        let ok = login(&db, login_request("ana", "pw")).await;
        assert_eq!(ok.code(), 200);
        let ApiResponse::Success(body) = ok else {
            panic!("expected success");
        };
        assert_eq!(body.data["user"]["username"], "ana");

        let wrong = login(&db, login_request("ana", "nope")).await;
        assert_eq!(wrong.code(), 401);
        assert!(!wrong.is_success());

        let unknown = login(&db, login_request("ghost", "pw")).await;
        assert_eq!(unknown.code(), 401);
    }

    #[tokio::test]
    async fn test_list_users_excludes_admin() {
        let db = helper().await;
        assert_eq!(list_users(&db).await.code(), 404);

        signup(&db, signup_request("admin", "root")).await;
        assert_eq!(list_users(&db).await.code(), 404);

        for i in 0..12 {
            signup(&db, signup_request(&format!("user{}", i), "pw")).await;
        }
        let ApiResponse::Success(body) = list_users(&db).await else {
            panic!("expected success");
        };
        let users = body.data["users"].as_array().unwrap();
        assert_eq!(users.len(), 12);
        assert!(users.iter().all(|u| u["username"] != "admin"));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let db = helper().await;
        assert_eq!(delete_user(&db, "ana").await.code(), 404);

        signup(&db, signup_request("ana", "pw")).await;
        let resp = delete_user(&db, "ana").await;
        assert_eq!(resp.code(), 200);
        assert!(db.find_one(USERS, doc! { "username": "ana" }).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_signup_race_caught_by_unique_index() {
        let db = scripted(true, false).await;
        assert_eq!(signup(&db, signup_request("ana", "pw")).await.code(), 201);

        // The existence check sees nothing; the index still refuses the insert.
        let resp = signup(&db, signup_request("ana", "pw2")).await;
        assert_eq!(resp.code(), 409);
        let ApiResponse::Error(body) = resp else {
            panic!("expected error");
        };
        assert_eq!(body.errors[0].message, "Username already exists");
        assert_eq!(db.count_documents(USERS, doc! { "username": "ana" }).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_signup_insert_failure_keeps_legacy_code() {
        let db = scripted(false, true).await;
        let resp = signup(&db, signup_request("ana", "pw")).await;
        assert_eq!(resp.code(), 404);
        let ApiResponse::Error(body) = resp else {
            panic!("expected error");
        };
        assert_eq!(body.errors[0].message, "Signup failed");
    }
}
