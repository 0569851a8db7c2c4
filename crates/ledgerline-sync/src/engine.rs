//! # Reconciliation Engine
//!
//! Orchestrates one incremental reconciliation run.
//!
//! ## Run State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Reconciliation Run                                  │
//! │                                                                         │
//! │  IDLE                                                                   │
//! │   │  read cursor (or default lookback), wall clock = window end        │
//! │   ▼                                                                     │
//! │  FETCHING      search transactions in [begin, end]       FATAL on err  │
//! │   │  zero transactions? → advance cursor, done (successful no-op)      │
//! │   ▼                                                                     │
//! │  ENRICHING     orders → catalog → bookings → staff → customers         │
//! │   │            (booking/staff/customer lookups are best-effort)        │
//! │   ▼                                                                     │
//! │  COMPUTING     attribution chain + commission engine, one row per tx   │
//! │   ▼                                                                     │
//! │  MERGING       upsert by transaction id                   FATAL on err │
//! │   ▼                                                                     │
//! │  CURSOR-ADVANCED   flush caches, cursor = window end   (terminal)      │
//! │                                                                         │
//! │  Any fatal error leaves the cursor untouched: the next run retries     │
//! │  the identical window, and merges are idempotent by transaction id.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use ledgerline_core::{
    resolve_customer_name, resolve_staff, unattributed_booking_id, AttributionInput,
    CommissionEngine, CommissionPolicy, Order, ProcessedRow, RateBook, Transaction,
};
use ledgerline_store::Database;

use crate::cache::{CacheKind, RunCache};
use crate::error::SyncResult;
use crate::source::LedgerSource;

// =============================================================================
// Run Phase
// =============================================================================

/// Phases of one reconciliation run, logged as the run progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Fetching,
    Enriching,
    Computing,
    Merging,
    CursorAdvanced,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Fetching => "fetching",
            RunPhase::Enriching => "enriching",
            RunPhase::Computing => "computing",
            RunPhase::Merging => "merging",
            RunPhase::CursorAdvanced => "cursor-advanced",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Run Summary
// =============================================================================

/// What one run did, for the caller's log line.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Lower bound of the scanned window.
    pub window_begin: DateTime<Utc>,

    /// Upper bound of the scanned window (the new cursor).
    pub window_end: DateTime<Utc>,

    /// Transactions returned by the search.
    pub fetched: usize,

    /// Rows merged into the output table.
    pub merged: usize,

    /// Rows whose staff attribution could not be resolved by any chain step.
    pub missing_attribution: usize,

    /// Cache entries written back at run end.
    pub cache_writes: usize,
}

// =============================================================================
// Reconciliation Engine
// =============================================================================

/// Drives one run: window → fetch → enrich → compute → merge → advance.
///
/// Generic over the input source so the same loop serves the live API
/// client and in-memory sources in tests. Single-threaded and
/// run-to-completion: the host scheduler serializes invocations.
pub struct ReconciliationEngine<S> {
    source: S,
    db: Database,
    commission: CommissionEngine,
    lookback: Duration,
}

impl<S: LedgerSource> ReconciliationEngine<S> {
    /// Creates an engine over a source, a state store, and the run's rate
    /// configuration.
    pub fn new(
        source: S,
        db: Database,
        book: RateBook,
        policy: CommissionPolicy,
        lookback_days: i64,
    ) -> Self {
        ReconciliationEngine {
            source,
            db,
            commission: CommissionEngine::new(book, policy),
            lookback: Duration::days(lookback_days),
        }
    }

    /// Runs one reconciliation pass with the current wall clock as the
    /// window's upper bound.
    pub async fn run(&self) -> SyncResult<RunSummary> {
        self.run_window_ending(Utc::now()).await
    }

    /// Runs one pass with an explicit window upper bound (tests pin the
    /// clock through this).
    pub async fn run_window_ending(&self, window_end: DateTime<Utc>) -> SyncResult<RunSummary> {
        // ---------------------------------------------------------------------
        // FETCHING
        // ---------------------------------------------------------------------
        let window_begin = match self.db.state().cursor().await? {
            Some(cursor) => cursor,
            None => window_end - self.lookback,
        };
        info!(
            phase = %RunPhase::Fetching,
            begin = %window_begin.to_rfc3339(),
            end = %window_end.to_rfc3339(),
            "Starting reconciliation run"
        );

        let transactions = self
            .source
            .search_transactions(window_begin, window_end)
            .await?;

        if transactions.is_empty() {
            // An empty batch is a successful no-op, not an error: advance
            // the cursor, touch nothing else.
            self.db.state().set_cursor(window_end).await?;
            info!(phase = %RunPhase::CursorAdvanced, "No updated transactions; cursor advanced");
            return Ok(RunSummary {
                window_begin,
                window_end,
                fetched: 0,
                merged: 0,
                missing_attribution: 0,
                cache_writes: 0,
            });
        }

        // ---------------------------------------------------------------------
        // ENRICHING
        // ---------------------------------------------------------------------
        info!(phase = %RunPhase::Enriching, transactions = transactions.len(), "Resolving related entities");
        let mut cache = RunCache::load(&self.db).await?;

        let order_ids = distinct(transactions.iter().filter_map(|t| t.order_id.clone()));
        let orders = self.source.batch_orders(&order_ids).await?;

        let catalog_ids = distinct(
            orders
                .values()
                .flat_map(|o| o.line_items.iter().filter_map(|l| l.catalog_id.clone())),
        );
        let catalog = if catalog_ids.is_empty() {
            HashMap::new()
        } else {
            self.source.batch_catalog(&catalog_ids).await?
        };

        // Booking attributions: per-id best-effort lookups for uncached refs.
        let booking_ids = distinct(orders.values().filter_map(|o| o.booking_id.clone()));
        let source = &self.source;
        cache
            .fill(CacheKind::BookingStaff, &booking_ids, |id| async move {
                source.retrieve_booking_staff(&id).await
            })
            .await;

        // Staff names: union of payment refs, legacy order refs, and the
        // booking attributions just resolved. Ids the alias table covers
        // never need a remote lookup.
        let mut staff_ids: Vec<String> = transactions
            .iter()
            .filter_map(|t| t.staff_id.clone())
            .chain(orders.values().filter_map(|o| o.legacy_staff_id.clone()))
            .collect();
        let booking_map = cache.map(CacheKind::BookingStaff);
        staff_ids.extend(
            booking_ids
                .iter()
                .filter_map(|id| booking_map.get(id))
                .filter(|staff| !staff.is_empty())
                .cloned(),
        );
        let book = self.commission.book();
        let staff_ids = distinct(
            staff_ids
                .into_iter()
                .filter(|id| book.alias_name(id).is_none()),
        );
        cache
            .fill(CacheKind::StaffName, &staff_ids, |id| async move {
                source.retrieve_staff_name(&id).await
            })
            .await;

        // Customer names: batch lookup for uncached ids; a failure here
        // only costs display names, never the run.
        let customer_ids = distinct(
            transactions
                .iter()
                .filter_map(|t| t.customer_id.clone())
                .chain(orders.values().filter_map(|o| o.customer_id.clone())),
        );
        let uncached = cache.missing(CacheKind::CustomerName, customer_ids.iter());
        if !uncached.is_empty() {
            match self.source.batch_customers(&uncached).await {
                Ok(found) => {
                    cache.insert_batch_outcome(CacheKind::CustomerName, &uncached, &found)
                }
                Err(e) => {
                    warn!(error = %e, "Customer batch fetch failed; names left unresolved")
                }
            }
        }

        // ---------------------------------------------------------------------
        // COMPUTING
        // ---------------------------------------------------------------------
        info!(phase = %RunPhase::Computing, "Computing commission rows");
        let mut rows: Vec<ProcessedRow> = Vec::with_capacity(transactions.len());
        let mut missing_attribution = 0;

        for tx in &transactions {
            let order = tx.order_id.as_deref().and_then(|id| orders.get(id));

            let attribution = resolve_staff(&AttributionInput {
                transaction: tx,
                order,
                booking_staff: cache.map(CacheKind::BookingStaff),
            });

            if attribution.provenance.is_missing() {
                missing_attribution += 1;
                self.diagnose_missing_attribution(tx, order, &cache).await;
            }

            let staff_name = self.staff_display_name(&attribution.staff_id, &cache);
            let customer_name =
                resolve_customer_name(tx, order, cache.map(CacheKind::CustomerName));

            rows.push(self.commission.compute_row(
                tx,
                order,
                &catalog,
                &staff_name,
                customer_name,
                attribution.provenance,
            ));
        }

        // ---------------------------------------------------------------------
        // MERGING
        // ---------------------------------------------------------------------
        info!(phase = %RunPhase::Merging, rows = rows.len(), "Merging into output table");
        let merged = self.db.rows().merge_many(&rows).await?;

        // Caches first, cursor strictly last: a failure anywhere above
        // leaves the cursor on the previous window.
        let cache_writes = cache.flush(&self.db).await?;
        self.db.state().set_cursor(window_end).await?;

        let summary = RunSummary {
            window_begin,
            window_end,
            fetched: transactions.len(),
            merged,
            missing_attribution,
            cache_writes,
        };
        info!(
            phase = %RunPhase::CursorAdvanced,
            fetched = summary.fetched,
            merged = summary.merged,
            missing_attribution = summary.missing_attribution,
            "Run complete"
        );
        Ok(summary)
    }

    /// Staff display name: alias table first (operators can relabel staff
    /// without waiting for cache expiry), then the persisted cache. An
    /// unresolved name stays empty.
    fn staff_display_name(&self, staff_id: &str, cache: &RunCache) -> String {
        if staff_id.is_empty() {
            return String::new();
        }
        if let Some(name) = self.commission.book().alias_name(staff_id) {
            return name.to_string();
        }
        cache
            .get(CacheKind::StaffName, staff_id)
            .unwrap_or_default()
            .to_string()
    }

    /// Best-effort diagnostic when no attribution chain step matched: if
    /// a booking reference existed without an attribution, fetch its
    /// detail for the log. Failures here are swallowed — diagnostics must
    /// never hurt the run.
    async fn diagnose_missing_attribution(
        &self,
        tx: &Transaction,
        order: Option<&Order>,
        cache: &RunCache,
    ) {
        let order_id = order.map(|o| o.id.as_str()).unwrap_or("-");
        match unattributed_booking_id(order, cache.map(CacheKind::BookingStaff)) {
            Some(booking_id) => match self.source.retrieve_booking_staff(booking_id).await {
                Ok(detail) => warn!(
                    transaction = %tx.id,
                    order = %order_id,
                    booking = %booking_id,
                    booking_staff = ?detail,
                    "Staff attribution missing despite booking reference"
                ),
                Err(e) => debug!(
                    transaction = %tx.id,
                    booking = %booking_id,
                    error = %e,
                    "Diagnostic booking fetch failed"
                ),
            },
            None => warn!(
                transaction = %tx.id,
                order = %order_id,
                "Staff attribution missing; no usable signal on payment or order"
            ),
        }
    }
}

/// Sorted, de-duplicated, non-empty id list.
fn distinct<I: IntoIterator<Item = String>>(ids: I) -> Vec<String> {
    let mut out: Vec<String> = ids.into_iter().filter(|id| !id.is_empty()).collect();
    out.sort();
    out.dedup();
    out
}

// =============================================================================
// Unit Tests
// =============================================================================
