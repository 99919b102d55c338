//! libSQL storage layer for synchronized news items.
//!
//! The [`Storage`] struct wraps a local libSQL database holding the durable
//! item store and the synchronization run history.
//!
//! The reconciliation engine touches this store exactly twice per run shape:
//! one [`Storage::latest_item`] read per source before that source is
//! scanned, and at most one [`Storage::bulk_insert`] at the end of the run.
//! The bulk insert is a single transaction, so a run's result lands
//! atomically or not at all.

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use newssync_shared::{NewsItem, NewsSyncError, Result};
use uuid::Uuid;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| NewsSyncError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| NewsSyncError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| NewsSyncError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    NewsSyncError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Item operations
    // -----------------------------------------------------------------------

    /// List all stored items for a source, oldest first.
    pub async fn items_by_source(&self, source: &str) -> Result<Vec<NewsItem>> {
        let mut rows = self
            .conn
            .query(
                "SELECT source, item_id, url, title, body, fetched_at
                 FROM items WHERE source = ?1 ORDER BY item_id",
                params![source],
            )
            .await
            .map_err(|e| NewsSyncError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_item(&row)?);
        }
        Ok(results)
    }

    /// The stored item with the greatest id for a source, or `None` if the
    /// source has never been synchronized.
    pub async fn latest_item(&self, source: &str) -> Result<Option<NewsItem>> {
        let mut rows = self
            .conn
            .query(
                "SELECT source, item_id, url, title, body, fetched_at
                 FROM items WHERE source = ?1 ORDER BY item_id DESC LIMIT 1",
                params![source],
            )
            .await
            .map_err(|e| NewsSyncError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_item(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(NewsSyncError::Storage(e.to_string())),
        }
    }

    /// Insert all items in one transaction.
    pub async fn bulk_insert(&self, items: &[NewsItem]) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| NewsSyncError::Storage(e.to_string()))?;

        for item in items {
            tx.execute(
                "INSERT INTO items (source, item_id, url, title, body, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    item.source.as_str(),
                    item.id as i64,
                    item.url.as_str(),
                    item.title.as_deref(),
                    item.body.as_deref(),
                    item.fetched_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| NewsSyncError::Storage(format!("insert {item}: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| NewsSyncError::Storage(format!("bulk insert commit: {e}")))?;

        tracing::debug!(count = items.len(), "bulk insert committed");
        Ok(())
    }

    /// Total number of stored items across all sources.
    pub async fn item_count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM items", params![])
            .await
            .map_err(|e| NewsSyncError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<u64>(0)
                .map_err(|e| NewsSyncError::Storage(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(NewsSyncError::Storage(e.to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Sync run history
    // -----------------------------------------------------------------------

    /// Insert a new sync run row. Returns the generated run ID.
    pub async fn insert_sync_run(&self) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO sync_runs (id, started_at) VALUES (?1, ?2)",
                params![id.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| NewsSyncError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Mark a sync run finished with summary stats.
    pub async fn finish_sync_run(&self, run_id: &str, stats_json: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE sync_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id],
            )
            .await
            .map_err(|e| NewsSyncError::Storage(e.to_string()))?;
        Ok(())
    }
}

/// Convert a database row to a [`NewsItem`].
fn row_to_item(row: &libsql::Row) -> Result<NewsItem> {
    Ok(NewsItem {
        source: row
            .get::<String>(0)
            .map_err(|e| NewsSyncError::Storage(e.to_string()))?,
        id: row
            .get::<i64>(1)
            .map_err(|e| NewsSyncError::Storage(e.to_string()))? as u64,
        url: row
            .get::<String>(2)
            .map_err(|e| NewsSyncError::Storage(e.to_string()))?,
        title: row.get::<String>(3).ok(),
        body: row.get::<String>(4).ok(),
        fetched_at: {
            let s: String = row
                .get(5)
                .map_err(|e| NewsSyncError::Storage(e.to_string()))?;
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .map_err(|e| NewsSyncError::Storage(format!("invalid date: {e}")))?
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("newssync_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn make_item(source: &str, id: u64) -> NewsItem {
        NewsItem {
            id,
            source: source.into(),
            url: format!("https://{source}.example.com/news/{id}"),
            title: Some(format!("headline {id}")),
            body: Some("text".into()),
            fetched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("newssync_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn bulk_insert_and_read_back() {
        let storage = test_storage().await;
        let items = vec![make_item("lenta", 1), make_item("lenta", 2)];

        storage.bulk_insert(&items).await.expect("bulk insert");

        let stored = storage.items_by_source("lenta").await.expect("read back");
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].id, 1);
        assert_eq!(stored[1].id, 2);
        assert_eq!(stored[1].title.as_deref(), Some("headline 2"));
    }

    #[tokio::test]
    async fn latest_item_picks_greatest_id() {
        let storage = test_storage().await;
        storage
            .bulk_insert(&[
                make_item("lenta", 3),
                make_item("lenta", 12),
                make_item("lenta", 7),
            ])
            .await
            .unwrap();

        let latest = storage.latest_item("lenta").await.expect("latest");
        assert_eq!(latest.expect("some item").id, 12);
    }

    #[tokio::test]
    async fn latest_item_is_source_scoped() {
        let storage = test_storage().await;
        storage
            .bulk_insert(&[make_item("lenta", 5), make_item("meduza", 99)])
            .await
            .unwrap();

        let latest = storage.latest_item("lenta").await.unwrap();
        assert_eq!(latest.expect("some item").id, 5);
    }

    #[tokio::test]
    async fn latest_item_none_for_unknown_source() {
        let storage = test_storage().await;
        let latest = storage.latest_item("never-synced").await.expect("query");
        assert!(latest.is_none());
    }

    #[tokio::test]
    async fn duplicate_identity_rolls_back_whole_batch() {
        let storage = test_storage().await;
        storage.bulk_insert(&[make_item("lenta", 1)]).await.unwrap();

        // Second batch contains an already-stored identity; nothing from the
        // batch must land.
        let result = storage
            .bulk_insert(&[make_item("lenta", 2), make_item("lenta", 1)])
            .await;
        assert!(result.is_err());
        assert_eq!(storage.item_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn sync_run_lifecycle() {
        let storage = test_storage().await;
        let run_id = storage.insert_sync_run().await.expect("insert run");
        assert!(!run_id.is_empty());

        storage
            .finish_sync_run(&run_id, r#"{"items_new": 4}"#)
            .await
            .expect("finish run");
    }
}
