//! Settings Storage using SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SettingsStore,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
"#;

const UPSERT: &str = r#"
    INSERT INTO settings (key, value, updated_at)
    VALUES (?, ?, ?)
    ON CONFLICT(key) DO UPDATE SET
        value = excluded.value,
        updated_at = excluded.updated_at
"#;

fn db_error(context: &str, e: sqlx::Error) -> BridgeError {
    BridgeError::Storage(format!("{}: {}", context, e))
}

/// SQLite-backed settings store
///
/// A file-backed store survives restarts. The in-memory variant lives as long
/// as the process and stands in for storage scoped to a single host session.
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    /// Open (or create) a settings database at `db_path`
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        // SQLite URLs want forward slashes
        let path_str = db_path.to_string_lossy().replace('\\', "/");
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path_str))
            .map_err(|e| db_error("Invalid database path", e))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| db_error("Failed to connect to DB", e))?;

        let store = Self::from_pool(pool).await?;
        debug!(path = ?db_path, "Initialized settings store");
        Ok(store)
    }

    /// Create a store that lives only as long as this process
    pub async fn in_memory() -> Result<Self> {
        // Every SQLite memory connection is its own database, so pin the
        // pool to one connection that is never reaped.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| db_error("Failed to connect to DB", e))?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(|e| db_error("Failed to create table", e))?;

        Ok(Self { pool })
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(UPSERT)
            .bind(key)
            .bind(value)
            .bind(Self::now())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to set setting", e))?;

        debug!(key, bytes = value.len(), "Stored setting");
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get setting", e))?;

        Ok(row.map(|row| row.get(0)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete setting", e))?;

        debug!(key, "Deleted setting");
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to check key", e))?;

        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn string_roundtrip_and_delete() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();

        store.set_string("dataStore", "{}").await.unwrap();
        assert_eq!(
            store.get_string("dataStore").await.unwrap(),
            Some("{}".to_string())
        );

        store.delete("dataStore").await.unwrap();
        assert_eq!(store.get_string("dataStore").await.unwrap(), None);
        assert!(!store.has_key("dataStore").await.unwrap());
    }

    #[tokio::test]
    async fn overwrite_replaces_previous_value() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();

        store.set_string("dataStore", r#"{"headers":[]}"#).await.unwrap();
        store.set_string("dataStore", r#"{"headers":["a"]}"#).await.unwrap();

        assert_eq!(
            store.get_string("dataStore").await.unwrap().as_deref(),
            Some(r#"{"headers":["a"]}"#)
        );
    }

    #[tokio::test]
    async fn deleting_a_missing_key_is_fine() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();

        store.delete("never-set").await.unwrap();
        assert!(!store.has_key("never-set").await.unwrap());
    }

    #[tokio::test]
    async fn file_backed_store_persists() {
        let dir = std::env::temp_dir().join(format!("datafy-settings-{}", std::process::id()));
        let path = dir.join("settings.db");
        let _ = std::fs::remove_dir_all(&dir);

        {
            let store = SqliteSettingsStore::new(path.clone()).await.unwrap();
            store.set_string("k", "v").await.unwrap();
        }

        let reopened = SqliteSettingsStore::new(path).await.unwrap();
        assert_eq!(reopened.get_string("k").await.unwrap(), Some("v".into()));

        let _ = std::fs::remove_dir_all(dir);
    }
}
