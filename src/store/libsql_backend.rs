//! libSQL backend — async `SessionStore` and `IdentityStore` implementation.
//!
//! Sessions are stored one row per field so that an upsert of a partial
//! field map merges into the existing document without a read-modify-write.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::session::{Session, SessionPatch};
use crate::store::traits::{Identity, IdentityStore, SessionStore};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(backend.conn()).await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Sessions ────────────────────────────────────────────────────────

#[async_trait]
impl SessionStore for LibSqlBackend {
    async fn get_session(&self, user_id: &str) -> Result<Session, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT key, value FROM session_fields WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?;

        let mut fields = BTreeMap::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?
        {
            let key: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("get_session key: {e}")))?;
            let value_str: String = row.get(1).unwrap_or_else(|_| "null".to_string());
            let value = serde_json::from_str(&value_str).unwrap_or(serde_json::Value::Null);
            if !value.is_null() {
                fields.insert(key, value);
            }
        }

        Ok(Session::from_fields(fields))
    }

    async fn upsert_session(
        &self,
        user_id: &str,
        patch: &SessionPatch,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();

        for (key, value) in patch.iter() {
            if value.is_null() {
                conn.execute(
                    "DELETE FROM session_fields WHERE user_id = ?1 AND key = ?2",
                    params![user_id, key.as_str()],
                )
                .await
                .map_err(|e| DatabaseError::Query(format!("upsert_session clear {key}: {e}")))?;
                continue;
            }

            let value_str = serde_json::to_string(value)
                .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
            conn.execute(
                "INSERT INTO session_fields (user_id, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id, key) DO UPDATE SET value = ?3, updated_at = ?4",
                params![user_id, key.as_str(), value_str, now.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_session {key}: {e}")))?;
        }

        debug!(user_id, fields = patch.iter().count(), "Session upserted");
        Ok(())
    }
}

// ── Identities ──────────────────────────────────────────────────────

#[async_trait]
impl IdentityStore for LibSqlBackend {
    async fn upsert_identity(
        &self,
        address: &str,
        secret: &SecretString,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO identities (address, secret, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT (address) DO UPDATE SET secret = ?2, updated_at = ?3",
                params![address, secret.expose_secret(), now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_identity: {e}")))?;
        Ok(())
    }

    async fn list_identities(&self) -> Result<Vec<Identity>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT address, secret FROM identities ORDER BY created_at ASC, rowid ASC",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_identities: {e}")))?;

        let mut identities = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_identities: {e}")))?
        {
            let address: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("list_identities address: {e}")))?;
            let secret: String = row
                .get(1)
                .map_err(|e| DatabaseError::Query(format!("list_identities secret: {e}")))?;
            identities.push(Identity::new(address, secret));
        }
        Ok(identities)
    }

    async fn remove_identity(&self, address: &str) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM identities WHERE address = ?1",
                params![address],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("remove_identity: {e}")))?;
        Ok(count > 0)
    }

    async fn count_identities(&self) -> Result<usize, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT COUNT(*) FROM identities", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("count_identities: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row.get(0).unwrap_or(0);
                Ok(count.max(0) as usize)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("count_identities: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::session::keys;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    // ── Session tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn unknown_actor_reads_empty() {
        let db = test_db().await;
        let session = db.get_session("nobody").await.unwrap();
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn upsert_merges_fields() {
        let db = test_db().await;
        db.upsert_session("7", &SessionPatch::new().set(keys::ATTACHMENT, "file-1"))
            .await
            .unwrap();
        db.upsert_session("7", &SessionPatch::new().set(keys::TARGET_LINK, "t.me/x"))
            .await
            .unwrap();

        let session = db.get_session("7").await.unwrap();
        assert_eq!(session.attachment(), Some("file-1"));
        assert_eq!(session.get_str(keys::TARGET_LINK), Some("t.me/x"));
    }

    #[tokio::test]
    async fn later_write_overrides_same_field() {
        let db = test_db().await;
        for file in ["a", "b", "c"] {
            db.upsert_session("7", &SessionPatch::new().set(keys::ATTACHMENT, file))
                .await
                .unwrap();
        }
        let session = db.get_session("7").await.unwrap();
        assert_eq!(session.attachment(), Some("c"));
        assert_eq!(session.fields().len(), 1);
    }

    #[tokio::test]
    async fn sequence_of_upserts_is_union() {
        let db = test_db().await;
        let patches = [
            SessionPatch::new().set("a", 1).set("b", 1),
            SessionPatch::new().set("c", 2),
            SessionPatch::new().set("a", 3).set("d", json!({"nested": true})),
        ];
        let mut expected = Session::default();
        for patch in &patches {
            db.upsert_session("u", patch).await.unwrap();
            expected.apply(patch);
        }
        assert_eq!(db.get_session("u").await.unwrap(), expected);
        assert_eq!(expected.get("a"), Some(&json!(3)));
    }

    #[tokio::test]
    async fn null_clears_field() {
        let db = test_db().await;
        db.upsert_session("7", &SessionPatch::new().set("a", "x").set("b", "y"))
            .await
            .unwrap();
        db.upsert_session("7", &SessionPatch::new().clear("a"))
            .await
            .unwrap();

        let session = db.get_session("7").await.unwrap();
        assert!(session.get("a").is_none());
        assert_eq!(session.get_str("b"), Some("y"));
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_actor() {
        let db = test_db().await;
        db.upsert_session("1", &SessionPatch::new().set("a", "one"))
            .await
            .unwrap();
        db.upsert_session("2", &SessionPatch::new().set("a", "two"))
            .await
            .unwrap();
        assert_eq!(db.get_session("1").await.unwrap().get_str("a"), Some("one"));
        assert_eq!(db.get_session("2").await.unwrap().get_str("a"), Some("two"));
    }

    #[tokio::test]
    async fn file_backed_database_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("bot.db");
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.upsert_session("9", &SessionPatch::new().set("k", "v"))
                .await
                .unwrap();
        }
        assert!(path.exists());
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert_eq!(db.get_session("9").await.unwrap().get_str("k"), Some("v"));
    }

    // ── Identity tests ──────────────────────────────────────────────

    #[tokio::test]
    async fn identities_listed_in_insertion_order() {
        let db = test_db().await;
        db.upsert_identity("b@example.com", &SecretString::from("s1".to_string()))
            .await
            .unwrap();
        db.upsert_identity("a@example.com", &SecretString::from("s2".to_string()))
            .await
            .unwrap();

        let list = db.list_identities().await.unwrap();
        let addresses: Vec<&str> = list.iter().map(|i| i.address.as_str()).collect();
        assert_eq!(addresses, vec!["b@example.com", "a@example.com"]);
    }

    #[tokio::test]
    async fn upsert_identity_rotates_secret() {
        let db = test_db().await;
        db.upsert_identity("a@example.com", &SecretString::from("old".to_string()))
            .await
            .unwrap();
        db.upsert_identity("a@example.com", &SecretString::from("new".to_string()))
            .await
            .unwrap();

        let list = db.list_identities().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].secret.expose_secret(), "new");
        assert_eq!(db.count_identities().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn remove_identity_reports_existence() {
        let db = test_db().await;
        db.upsert_identity("a@example.com", &SecretString::from("s".to_string()))
            .await
            .unwrap();
        assert!(db.remove_identity("a@example.com").await.unwrap());
        assert!(!db.remove_identity("a@example.com").await.unwrap());
        assert_eq!(db.count_identities().await.unwrap(), 0);
    }
}
