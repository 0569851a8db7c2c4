//! # Run Cache
//!
//! A run-scoped view over the three persisted entity caches.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Run start                                                              │
//! │     RunCache::load(db)    ← every kind read ONCE into memory           │
//! │         │                                                               │
//! │  During the run                                                        │
//! │     get / missing / fill  ← remote lookups only for unresolved keys;   │
//! │         │                   "found nothing" stored as "" sentinel       │
//! │         │                   so the lookup is never repeated             │
//! │  Run end                                                               │
//! │     flush(db)             ← only entries written this run go back      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lookup failures during `fill` are recoverable-enrichment errors: they
//! are logged and the key stays unresolved (no sentinel), so the next
//! run retries it naturally.

use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, warn};

use ledgerline_store::{Database, DbResult};

use crate::error::SyncResult;

// =============================================================================
// Cache Kinds
// =============================================================================

/// The three persisted cache namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    /// staff id → display name
    StaffName,
    /// customer id → display name
    CustomerName,
    /// booking/appointment id → staff id
    BookingStaff,
}

impl CacheKind {
    /// Table namespace for this kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            CacheKind::StaffName => "staff_name",
            CacheKind::CustomerName => "customer_name",
            CacheKind::BookingStaff => "booking_staff",
        }
    }
}

// =============================================================================
// Run Cache
// =============================================================================

/// One kind's in-memory state plus the entries written this run.
#[derive(Debug, Default)]
struct KindState {
    entries: HashMap<String, String>,
    dirty: Vec<(String, String)>,
}

impl KindState {
    fn insert(&mut self, key: String, value: String) {
        self.dirty.push((key.clone(), value.clone()));
        self.entries.insert(key, value);
    }
}

/// Run-scoped cache: loaded once at run start, flushed once at run end.
#[derive(Debug, Default)]
pub struct RunCache {
    staff: KindState,
    customers: KindState,
    bookings: KindState,
}

impl RunCache {
    /// Loads every cache kind from the store.
    pub async fn load(db: &Database) -> DbResult<Self> {
        let repo = db.caches();
        let cache = RunCache {
            staff: KindState {
                entries: repo.load_kind(CacheKind::StaffName.as_str()).await?,
                dirty: Vec::new(),
            },
            customers: KindState {
                entries: repo.load_kind(CacheKind::CustomerName.as_str()).await?,
                dirty: Vec::new(),
            },
            bookings: KindState {
                entries: repo.load_kind(CacheKind::BookingStaff.as_str()).await?,
                dirty: Vec::new(),
            },
        };
        debug!(
            staff = cache.staff.entries.len(),
            customers = cache.customers.entries.len(),
            bookings = cache.bookings.entries.len(),
            "Run cache loaded"
        );
        Ok(cache)
    }

    fn state(&self, kind: CacheKind) -> &KindState {
        match kind {
            CacheKind::StaffName => &self.staff,
            CacheKind::CustomerName => &self.customers,
            CacheKind::BookingStaff => &self.bookings,
        }
    }

    fn state_mut(&mut self, kind: CacheKind) -> &mut KindState {
        match kind {
            CacheKind::StaffName => &mut self.staff,
            CacheKind::CustomerName => &mut self.customers,
            CacheKind::BookingStaff => &mut self.bookings,
        }
    }

    /// Cached value for a key. `Some("")` is the "looked up, found
    /// nothing" sentinel; `None` means never looked up.
    pub fn get(&self, kind: CacheKind, key: &str) -> Option<&str> {
        self.state(kind).entries.get(key).map(String::as_str)
    }

    /// Whole map for a kind (the attribution chain wants the booking map).
    pub fn map(&self, kind: CacheKind) -> &HashMap<String, String> {
        &self.state(kind).entries
    }

    /// Records a value, marking it for flush.
    pub fn insert(&mut self, kind: CacheKind, key: String, value: String) {
        self.state_mut(kind).insert(key, value);
    }

    /// The subset of `ids` with no cache entry at all (sentinels count as
    /// resolved — that's their whole point).
    pub fn missing<'a, I>(&self, kind: CacheKind, ids: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let entries = &self.state(kind).entries;
        let mut out: Vec<String> = ids
            .into_iter()
            .filter(|id| !id.is_empty() && !entries.contains_key(id.as_str()))
            .cloned()
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Stores the outcome of a batch lookup: resolved ids get their
    /// value, requested-but-absent ids get the sentinel.
    pub fn insert_batch_outcome(
        &mut self,
        kind: CacheKind,
        requested: &[String],
        found: &HashMap<String, String>,
    ) {
        for id in requested {
            let value = found.get(id).cloned().unwrap_or_default();
            self.insert(kind, id.clone(), value);
        }
    }

    /// Resolves every uncached id through a per-id resolver.
    ///
    /// `Ok(None)` caches the sentinel; `Err` is logged and the key left
    /// unresolved for the next run. Returns how many lookups were issued.
    pub async fn fill<F, Fut>(&mut self, kind: CacheKind, ids: &[String], mut resolver: F) -> usize
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = SyncResult<Option<String>>>,
    {
        let todo = self.missing(kind, ids.iter());
        let issued = todo.len();
        for id in todo {
            match resolver(id.clone()).await {
                Ok(value) => {
                    self.insert(kind, id, value.unwrap_or_default());
                }
                Err(e) => {
                    warn!(kind = kind.as_str(), id = %id, error = %e,
                        "Enrichment lookup failed; leaving unresolved");
                }
            }
        }
        issued
    }

    /// Writes every entry recorded this run back to the store.
    pub async fn flush(&self, db: &Database) -> DbResult<usize> {
        let repo = db.caches();
        let mut written = 0;
        for (kind, state) in [
            (CacheKind::StaffName, &self.staff),
            (CacheKind::CustomerName, &self.customers),
            (CacheKind::BookingStaff, &self.bookings),
        ] {
            repo.upsert_many(kind.as_str(), &state.dirty).await?;
            written += state.dirty.len();
        }
        debug!(entries = written, "Run cache flushed");
        Ok(written)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use ledgerline_store::DbConfig;

    #[tokio::test]
    async fn test_missing_excludes_sentinels_and_dedups() {
        let mut cache = RunCache::default();
        cache.insert(CacheKind::StaffName, "s1".into(), "Dana".into());
        cache.insert(CacheKind::StaffName, "s2".into(), String::new()); // sentinel

        let ids = vec![
            "s1".to_string(),
            "s2".to_string(),
            "s3".to_string(),
            "s3".to_string(),
            String::new(),
        ];
        assert_eq!(cache.missing(CacheKind::StaffName, ids.iter()), vec!["s3"]);
    }

    #[tokio::test]
    async fn test_fill_caches_sentinel_on_found_nothing() {
        let mut cache = RunCache::default();
        let ids = vec!["s1".to_string(), "s2".to_string()];

        let issued = cache
            .fill(CacheKind::StaffName, &ids, |id| async move {
                if id == "s1" {
                    Ok(Some("Dana".to_string()))
                } else {
                    Ok(None)
                }
            })
            .await;

        assert_eq!(issued, 2);
        assert_eq!(cache.get(CacheKind::StaffName, "s1"), Some("Dana"));
        // Found-nothing becomes a sentinel...
        assert_eq!(cache.get(CacheKind::StaffName, "s2"), Some(""));
        // ...so a second fill issues no lookups at all.
        let again = cache
            .fill(CacheKind::StaffName, &ids, |_| async move {
                Err(SyncError::Internal("must not be called".into()))
            })
            .await;
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn test_fill_leaves_failed_lookups_unresolved() {
        let mut cache = RunCache::default();
        let ids = vec!["b1".to_string()];

        cache
            .fill(CacheKind::BookingStaff, &ids, |_| async move {
                Err(SyncError::Remote {
                    status: 500,
                    body: "boom".into(),
                })
            })
            .await;

        // No sentinel: the next run must retry this key.
        assert_eq!(cache.get(CacheKind::BookingStaff, "b1"), None);
        assert_eq!(cache.missing(CacheKind::BookingStaff, ids.iter()), vec!["b1"]);
    }

    #[tokio::test]
    async fn test_batch_outcome_sentinels_absent_ids() {
        let mut cache = RunCache::default();
        let requested = vec!["c1".to_string(), "c2".to_string()];
        let found = HashMap::from([("c1".to_string(), "Alex".to_string())]);

        cache.insert_batch_outcome(CacheKind::CustomerName, &requested, &found);

        assert_eq!(cache.get(CacheKind::CustomerName, "c1"), Some("Alex"));
        assert_eq!(cache.get(CacheKind::CustomerName, "c2"), Some(""));
    }

    #[tokio::test]
    async fn test_flush_roundtrip() {
        let db = ledgerline_store::Database::new(DbConfig::in_memory())
            .await
            .unwrap();

        let mut cache = RunCache::load(&db).await.unwrap();
        cache.insert(CacheKind::StaffName, "s1".into(), "Dana".into());
        cache.insert(CacheKind::BookingStaff, "b1".into(), "s1".into());
        let written = cache.flush(&db).await.unwrap();
        assert_eq!(written, 2);

        // A fresh run sees the persisted entries.
        let reloaded = RunCache::load(&db).await.unwrap();
        assert_eq!(reloaded.get(CacheKind::StaffName, "s1"), Some("Dana"));
        assert_eq!(reloaded.get(CacheKind::BookingStaff, "b1"), Some("s1"));
        // Nothing dirty on a fresh load: flushing again writes zero rows.
        assert_eq!(reloaded.flush(&db).await.unwrap(), 0);
    }
}
