//! # Ledger Source
//!
//! The pluggable input seam for the reconciliation engine.
//!
//! Earlier generations of this pipeline existed as three near-duplicate
//! ETL paths that differed only in how raw input was shaped (positional
//! columns, regex-parsed descriptions, the live API). The engine is
//! instead parameterized by this one capability: anything that can
//! produce transactions and their related entities can drive a run. The
//! production implementation is [`crate::client::LedgerClient`]; tests
//! drive the engine with an in-memory source.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use ledgerline_core::{CatalogEntry, Order, Transaction};

use crate::error::SyncResult;

/// A source of transactions and their related entities.
///
/// ## Contract
/// - `search_transactions` returns the window's transactions ascending by
///   update time; an error here is FATAL for the run (cursor untouched).
/// - The `batch_*` fetches return a map keyed by id; ids the source does
///   not know are simply absent from the map.
/// - `retrieve_staff_name` / `retrieve_booking_staff` are single-entity,
///   best-effort lookups: `Ok(None)` means "looked up, found nothing"
///   (cached as a sentinel), an `Err` is recoverable (logged, field left
///   unresolved, retried naturally on the next run).
pub trait LedgerSource {
    /// Transactions updated within `[begin, end]`, ascending by update time.
    fn search_transactions(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl std::future::Future<Output = SyncResult<Vec<Transaction>>>;

    /// Orders for the given ids.
    fn batch_orders(
        &self,
        ids: &[String],
    ) -> impl std::future::Future<Output = SyncResult<HashMap<String, Order>>>;

    /// Catalog entries (variation id → name/category) for the given ids.
    fn batch_catalog(
        &self,
        ids: &[String],
    ) -> impl std::future::Future<Output = SyncResult<HashMap<String, CatalogEntry>>>;

    /// Customer display names for the given ids.
    fn batch_customers(
        &self,
        ids: &[String],
    ) -> impl std::future::Future<Output = SyncResult<HashMap<String, String>>>;

    /// Display name for one staff member.
    fn retrieve_staff_name(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = SyncResult<Option<String>>>;

    /// Staff id recorded as performing one booking.
    fn retrieve_booking_staff(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = SyncResult<Option<String>>>;
}
