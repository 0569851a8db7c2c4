//! # ledgerline-sync: Reconciliation Engine for Ledgerline
//!
//! This crate owns the full reconciliation run: the cursor-driven sync
//! window, every remote ledger call, the run-scoped entity caches, and
//! the idempotent merge into the output table.
//!
//! ## Modules
//!
//! - [`engine`] - the run state machine (fetch → enrich → compute → merge)
//! - [`source`] - the pluggable [`source::LedgerSource`] input seam
//! - [`client`] - the REST implementation of the source
//! - [`wire`] - typed serde shapes at the remote boundary
//! - [`cache`] - run-scoped view over the persisted entity caches
//! - [`ratebook`] - the Rate Source (rates, aliases, overrides) loader
//! - [`config`] - TOML + environment configuration
//! - [`error`] - the fatal / recoverable error taxonomy

pub mod cache;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod ratebook;
pub mod source;
pub mod wire;

pub use cache::{CacheKind, RunCache};
pub use client::LedgerClient;
pub use config::SyncConfig;
pub use engine::{ReconciliationEngine, RunPhase, RunSummary};
pub use error::{SyncError, SyncResult};
pub use ratebook::load_rate_book;
pub use source::LedgerSource;
