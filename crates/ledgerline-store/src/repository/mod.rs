//! # Repository Module
//!
//! Data access layer organized by concern:
//!
//! - [`cache`] - the persisted entity caches (staff, customer, booking)
//! - [`rows`] - the processed_rows output table (idempotent merge)
//! - [`state`] - the sync cursor

pub mod cache;
pub mod rows;
pub mod state;

pub use cache::CacheRepository;
pub use rows::{RowRepository, RowTotals};
pub use state::StateRepository;
