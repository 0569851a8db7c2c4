//! # Entity Cache Repository
//!
//! Persisted id→value caches that survive across runs, reducing remote
//! calls to only unresolved keys.
//!
//! ## Cache Kinds
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  kind            key                value                               │
//! │  ─────────────   ────────────────   ──────────────────────────────────  │
//! │  staff_name      staff id           display name                        │
//! │  customer_name   customer id        display name                        │
//! │  booking_staff   booking/appt id    staff id                            │
//! │                                                                         │
//! │  An empty-string value is the "looked up, found nothing" sentinel:     │
//! │  it prevents repeated fruitless remote lookups without being           │
//! │  mistaken for a real value.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A run loads each kind once at start and writes new entries back once
//! at the end — there is no per-key I/O mid-run.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use tracing::debug;

use crate::error::DbResult;

/// Repository for the flat `(kind, key) → value` cache table.
#[derive(Debug, Clone)]
pub struct CacheRepository {
    pool: SqlitePool,
}

impl CacheRepository {
    /// Creates a new CacheRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CacheRepository { pool }
    }

    /// Loads every entry of one cache kind into a map.
    pub async fn load_kind(&self, kind: &str) -> DbResult<HashMap<String, String>> {
        let rows = sqlx::query("SELECT key, value FROM entity_cache WHERE kind = ?1")
            .bind(kind)
            .fetch_all(&self.pool)
            .await?;

        let mut map = HashMap::with_capacity(rows.len());
        for row in rows {
            map.insert(row.try_get("key")?, row.try_get("value")?);
        }

        debug!(kind = %kind, entries = map.len(), "Loaded cache kind");
        Ok(map)
    }

    /// Writes a batch of entries for one kind, replacing existing keys,
    /// inside one transaction — the flush at run end is a single write.
    ///
    /// Callers only pass entries that are new or changed within the run,
    /// so replace-on-conflict is the right merge.
    pub async fn upsert_many(&self, kind: &str, entries: &[(String, String)]) -> DbResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            sqlx::query(
                r#"
                INSERT INTO entity_cache (kind, key, value, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (kind, key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(kind)
            .bind(key)
            .bind(value)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(kind = %kind, entries = entries.len(), "Flushed cache entries");
        Ok(())
    }

    /// Deletes every entry of every kind.
    ///
    /// Only reachable through `Database::reset()`, which also clears the
    /// sync cursor so cache and cursor stay consistent.
    pub async fn clear(&self) -> DbResult<()> {
        sqlx::query("DELETE FROM entity_cache")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_roundtrip_and_kind_isolation() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.caches();

        repo.upsert_many(
            "staff_name",
            &[
                ("s1".to_string(), "Dana".to_string()),
                ("s2".to_string(), String::new()), // sentinel
            ],
        )
        .await
        .unwrap();
        repo.upsert_many("customer_name", &[("c1".to_string(), "Alex".to_string())])
            .await
            .unwrap();

        let staff = repo.load_kind("staff_name").await.unwrap();
        assert_eq!(staff.len(), 2);
        assert_eq!(staff.get("s1").map(String::as_str), Some("Dana"));
        // Sentinel survives the roundtrip as an empty string
        assert_eq!(staff.get("s2").map(String::as_str), Some(""));

        let customers = repo.load_kind("customer_name").await.unwrap();
        assert_eq!(customers.len(), 1);
        assert!(!customers.contains_key("s1"));
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_key() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.caches();

        repo.upsert_many("staff_name", &[("s1".to_string(), "Dana".to_string())])
            .await
            .unwrap();
        repo.upsert_many("staff_name", &[("s1".to_string(), "Dana R.".to_string())])
            .await
            .unwrap();

        let staff = repo.load_kind("staff_name").await.unwrap();
        assert_eq!(staff.len(), 1);
        assert_eq!(staff.get("s1").map(String::as_str), Some("Dana R."));
    }

    #[tokio::test]
    async fn test_clear_removes_all_kinds() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.caches();

        repo.upsert_many("staff_name", &[("s1".to_string(), "Dana".to_string())])
            .await
            .unwrap();
        repo.upsert_many("booking_staff", &[("b1".to_string(), "s1".to_string())])
            .await
            .unwrap();

        repo.clear().await.unwrap();

        assert!(repo.load_kind("staff_name").await.unwrap().is_empty());
        assert!(repo.load_kind("booking_staff").await.unwrap().is_empty());
    }
}
