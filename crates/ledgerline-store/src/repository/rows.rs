//! # Processed Rows Repository
//!
//! The output table: one row per transaction id with the full commission
//! breakdown.
//!
//! ## Idempotent Merge
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  merge(row)                                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT .. ON CONFLICT (transaction_id) DO UPDATE                      │
//! │       │                                                                 │
//! │       ├── new id        → row appended, created_at stamped             │
//! │       └── known id      → row updated IN PLACE, created_at preserved   │
//! │                            (e.g. a refund applied after the charge)    │
//! │                                                                         │
//! │  INVARIANT: the table never holds two rows for one transaction id.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use ledgerline_core::{ProcessedRow, Provenance, TransactionStatus};

/// The single upsert statement behind every merge.
const UPSERT_ROW_SQL: &str = r#"
            INSERT INTO processed_rows (
                transaction_id, occurred_at, service_label, staff_name, fee_shared,
                amount_paid_cents, processing_fee_cents, staff_fee_share_cents,
                service_sales_cents, service_rate_bps, service_commission_cents,
                tips_cents, product_label, product_sales_cents, product_rate_bps,
                product_commission_cents, product_tax_cents, discounts_cents,
                other_adjustments_cents, total_commission_cents, net_take_cents,
                status, customer_name, provenance, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8,
                ?9, ?10, ?11,
                ?12, ?13, ?14, ?15,
                ?16, ?17, ?18,
                ?19, ?20, ?21,
                ?22, ?23, ?24, ?25, ?26
            )
            ON CONFLICT (transaction_id) DO UPDATE SET
                occurred_at              = excluded.occurred_at,
                service_label            = excluded.service_label,
                staff_name               = excluded.staff_name,
                fee_shared               = excluded.fee_shared,
                amount_paid_cents        = excluded.amount_paid_cents,
                processing_fee_cents     = excluded.processing_fee_cents,
                staff_fee_share_cents    = excluded.staff_fee_share_cents,
                service_sales_cents      = excluded.service_sales_cents,
                service_rate_bps         = excluded.service_rate_bps,
                service_commission_cents = excluded.service_commission_cents,
                tips_cents               = excluded.tips_cents,
                product_label            = excluded.product_label,
                product_sales_cents      = excluded.product_sales_cents,
                product_rate_bps         = excluded.product_rate_bps,
                product_commission_cents = excluded.product_commission_cents,
                product_tax_cents        = excluded.product_tax_cents,
                discounts_cents          = excluded.discounts_cents,
                other_adjustments_cents  = excluded.other_adjustments_cents,
                total_commission_cents   = excluded.total_commission_cents,
                net_take_cents           = excluded.net_take_cents,
                status                   = excluded.status,
                customer_name            = excluded.customer_name,
                provenance               = excluded.provenance,
                updated_at               = excluded.updated_at
"#;

/// Runs the upsert against any executor (pool or open transaction).
async fn upsert_row<'e, E>(executor: E, row: &ProcessedRow, now: &str) -> DbResult<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(UPSERT_ROW_SQL)
        .bind(&row.transaction_id)
        .bind(row.occurred_at.to_rfc3339())
        .bind(&row.service_label)
        .bind(&row.staff_name)
        .bind(row.fee_shared)
        .bind(row.amount_paid_cents)
        .bind(row.processing_fee_cents)
        .bind(row.staff_fee_share_cents)
        .bind(row.service_sales_cents)
        .bind(row.service_rate_bps as i64)
        .bind(row.service_commission_cents)
        .bind(row.tips_cents)
        .bind(&row.product_label)
        .bind(row.product_sales_cents)
        .bind(row.product_rate_bps as i64)
        .bind(row.product_commission_cents)
        .bind(row.product_tax_cents)
        .bind(row.discounts_cents)
        .bind(row.other_adjustments_cents)
        .bind(row.total_commission_cents)
        .bind(row.net_take_cents)
        .bind(row.status.as_str())
        .bind(&row.customer_name)
        .bind(row.provenance.as_str())
        .bind(now)
        .bind(now)
        .execute(executor)
        .await?;

    Ok(())
}

/// Repository for the `processed_rows` output table.
#[derive(Debug, Clone)]
pub struct RowRepository {
    pool: SqlitePool,
}

impl RowRepository {
    /// Creates a new RowRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RowRepository { pool }
    }

    /// Merges one row by transaction id: update in place when the id is
    /// already present, append otherwise.
    pub async fn merge(&self, row: &ProcessedRow) -> DbResult<()> {
        let now = Utc::now().to_rfc3339();
        upsert_row(&self.pool, row, &now).await
    }

    /// Merges a batch of rows inside one transaction, so a run's merge is
    /// a single all-or-nothing write.
    pub async fn merge_many(&self, rows: &[ProcessedRow]) -> DbResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        for row in rows {
            upsert_row(&mut *tx, row, &now).await?;
        }
        tx.commit().await?;

        debug!(rows = rows.len(), "Merged processed rows");
        Ok(rows.len())
    }

    /// Point lookup by transaction id.
    pub async fn get(&self, transaction_id: &str) -> DbResult<Option<ProcessedRow>> {
        let row = sqlx::query("SELECT * FROM processed_rows WHERE transaction_id = ?1")
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| from_sqlite_row(&r)).transpose()
    }

    /// Number of rows in the output table.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM processed_rows")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Whole-table sums for the status display.
    pub async fn totals(&self) -> DbResult<RowTotals> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(total_commission_cents), 0) AS commission,
                COALESCE(SUM(net_take_cents), 0) AS net
            FROM processed_rows
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(RowTotals {
            commission_cents: row.try_get("commission")?,
            net_take_cents: row.try_get("net")?,
        })
    }
}

/// Aggregates across the whole output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowTotals {
    pub commission_cents: i64,
    pub net_take_cents: i64,
}

/// Maps one SQLite row back into the domain type.
fn from_sqlite_row(r: &SqliteRow) -> DbResult<ProcessedRow> {
    let occurred_at: String = r.try_get("occurred_at")?;
    let occurred_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&occurred_at)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| DbError::CorruptValue {
            field: "occurred_at".into(),
            value: occurred_at.clone(),
        })?;
    let status: String = r.try_get("status")?;
    let provenance: String = r.try_get("provenance")?;

    Ok(ProcessedRow {
        transaction_id: r.try_get("transaction_id")?,
        occurred_at,
        service_label: r.try_get("service_label")?,
        staff_name: r.try_get("staff_name")?,
        fee_shared: r.try_get("fee_shared")?,
        amount_paid_cents: r.try_get("amount_paid_cents")?,
        processing_fee_cents: r.try_get("processing_fee_cents")?,
        staff_fee_share_cents: r.try_get("staff_fee_share_cents")?,
        service_sales_cents: r.try_get("service_sales_cents")?,
        service_rate_bps: r.try_get::<i64, _>("service_rate_bps")? as u32,
        service_commission_cents: r.try_get("service_commission_cents")?,
        tips_cents: r.try_get("tips_cents")?,
        product_label: r.try_get("product_label")?,
        product_sales_cents: r.try_get("product_sales_cents")?,
        product_rate_bps: r.try_get::<i64, _>("product_rate_bps")? as u32,
        product_commission_cents: r.try_get("product_commission_cents")?,
        product_tax_cents: r.try_get("product_tax_cents")?,
        discounts_cents: r.try_get("discounts_cents")?,
        other_adjustments_cents: r.try_get("other_adjustments_cents")?,
        total_commission_cents: r.try_get("total_commission_cents")?,
        net_take_cents: r.try_get("net_take_cents")?,
        status: status.parse().unwrap_or(TransactionStatus::Other),
        customer_name: r.try_get("customer_name")?,
        provenance: provenance.parse().unwrap_or(Provenance::StaffMissing),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use chrono::{TimeZone, Utc};
    use ledgerline_core::{ProcessedRow, Provenance, TransactionStatus};

    fn sample_row(id: &str) -> ProcessedRow {
        ProcessedRow {
            transaction_id: id.to_string(),
            occurred_at: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
            service_label: "Haircut".into(),
            staff_name: "Dana".into(),
            fee_shared: false,
            amount_paid_cents: 16_000,
            processing_fee_cents: 420,
            staff_fee_share_cents: 0,
            service_sales_cents: 10_000,
            service_rate_bps: 4_000,
            service_commission_cents: 4_000,
            tips_cents: 1_000,
            product_label: "Pomade".into(),
            product_sales_cents: 5_000,
            product_rate_bps: 1_000,
            product_commission_cents: 500,
            product_tax_cents: 450,
            discounts_cents: 0,
            other_adjustments_cents: 0,
            total_commission_cents: 5_500,
            net_take_cents: 9_080,
            status: TransactionStatus::Completed,
            customer_name: "Alex Doe".into(),
            provenance: Provenance::FromBooking,
        }
    }

    #[tokio::test]
    async fn test_merge_roundtrip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.rows();

        repo.merge(&sample_row("pay-1")).await.unwrap();

        let loaded = repo.get("pay-1").await.unwrap().unwrap();
        assert_eq!(loaded, sample_row("pay-1"));
    }

    #[tokio::test]
    async fn test_merge_is_upsert_not_append() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.rows();

        repo.merge(&sample_row("pay-1")).await.unwrap();

        // A later run observes the same id again, now refunded.
        let mut refunded = sample_row("pay-1");
        refunded.status = TransactionStatus::Refunded;
        refunded.net_take_cents = -420;
        repo.merge(&refunded).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 1);
        let loaded = repo.get("pay-1").await.unwrap().unwrap();
        assert_eq!(loaded.status, TransactionStatus::Refunded);
        assert_eq!(loaded.net_take_cents, -420);
    }

    #[tokio::test]
    async fn test_repeated_identical_merge_is_noop() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.rows();

        repo.merge(&sample_row("pay-1")).await.unwrap();
        let first = repo.get("pay-1").await.unwrap().unwrap();

        repo.merge(&sample_row("pay-1")).await.unwrap();
        let second = repo.get("pay-1").await.unwrap().unwrap();

        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_merge_many_counts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.rows();

        let merged = repo
            .merge_many(&[sample_row("pay-1"), sample_row("pay-2")])
            .await
            .unwrap();
        assert_eq!(merged, 2);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.rows().get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_totals() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.rows();

        // Empty table sums to zero rather than NULL.
        let empty = repo.totals().await.unwrap();
        assert_eq!(empty.commission_cents, 0);
        assert_eq!(empty.net_take_cents, 0);

        repo.merge(&sample_row("pay-1")).await.unwrap();
        repo.merge(&sample_row("pay-2")).await.unwrap();

        let totals = repo.totals().await.unwrap();
        assert_eq!(totals.commission_cents, 11_000);
        assert_eq!(totals.net_take_cents, 18_160);
    }
}
