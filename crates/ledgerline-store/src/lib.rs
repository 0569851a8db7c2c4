//! # ledgerline-store: State Store for Ledgerline
//!
//! SQLite-backed persistence for everything a reconciliation run owns
//! across invocations:
//!
//! - the three entity caches (staff names, customer names, booking
//!   attributions)
//! - the sync cursor
//! - the `processed_rows` output table
//!
//! ## Key Design Points
//!
//! - **Load once, flush once**: callers read whole cache kinds at run
//!   start and write new entries back at run end; no per-key I/O.
//! - **Idempotent merge**: `processed_rows` is keyed by transaction id;
//!   merging a known id updates in place, never appends.
//! - **One reset**: [`Database::reset`] clears caches and cursor together
//!   so they never drift apart.

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::{CacheRepository, RowRepository, StateRepository};
