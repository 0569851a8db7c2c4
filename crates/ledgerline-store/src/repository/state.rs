//! # Sync State Repository
//!
//! Owns the single persisted sync cursor: the upper bound of the last
//! successfully completed sync window.
//!
//! The cursor is advanced only after a run merges every row without a
//! fatal error; a failed run leaves it untouched so the next run retries
//! the identical window.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

use crate::error::DbResult;

/// Repository for the single-row `sync_state` table.
#[derive(Debug, Clone)]
pub struct StateRepository {
    pool: SqlitePool,
}

impl StateRepository {
    /// Creates a new StateRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StateRepository { pool }
    }

    /// Reads the persisted cursor, if any.
    ///
    /// A malformed stored timestamp is treated as absent (with a warning)
    /// rather than failing the run: the engine then falls back to the
    /// default lookback window, which is safe because merges are
    /// idempotent.
    pub async fn cursor(&self) -> DbResult<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT cursor FROM sync_state WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let stored: Option<String> = row.try_get("cursor")?;
        let Some(stored) = stored else {
            return Ok(None);
        };

        match DateTime::parse_from_rfc3339(&stored) {
            Ok(ts) => Ok(Some(ts.with_timezone(&Utc))),
            Err(e) => {
                warn!(cursor = %stored, error = %e, "Ignoring malformed persisted cursor");
                Ok(None)
            }
        }
    }

    /// Persists the cursor (RFC3339).
    pub async fn set_cursor(&self, ts: DateTime<Utc>) -> DbResult<()> {
        let cursor = ts.to_rfc3339();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO sync_state (id, cursor, updated_at)
            VALUES (1, ?1, ?2)
            ON CONFLICT (id) DO UPDATE SET
                cursor = excluded.cursor,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&cursor)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        debug!(cursor = %cursor, "Cursor advanced");
        Ok(())
    }

    /// Clears the cursor so the next run scans the full lookback window.
    pub async fn clear_cursor(&self) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_state (id, cursor, updated_at)
            VALUES (1, NULL, ?1)
            ON CONFLICT (id) DO UPDATE SET
                cursor = NULL,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Utc::now().to_rfc3339())
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
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_cursor_absent_initially() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.state().cursor().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cursor_roundtrip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap();

        db.state().set_cursor(ts).await.unwrap();
        assert_eq!(db.state().cursor().await.unwrap(), Some(ts));
    }

    #[tokio::test]
    async fn test_cursor_overwrite() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let first = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();

        db.state().set_cursor(first).await.unwrap();
        db.state().set_cursor(second).await.unwrap();
        assert_eq!(db.state().cursor().await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_clear_cursor() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.state().set_cursor(Utc::now()).await.unwrap();
        db.state().clear_cursor().await.unwrap();
        assert!(db.state().cursor().await.unwrap().is_none());
    }
}
