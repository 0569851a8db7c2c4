//! # ledgerline-core: Pure Business Logic for Ledgerline
//!
//! This crate is the **heart** of Ledgerline. It contains all business
//! logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Ledgerline Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  apps/reconciler (CLI)                          │   │
//! │  │        run one reconciliation pass, status, reset               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            ledgerline-sync (engine + remote client)             │   │
//! │  │   cursor window → fetch → enrich → compute → merge → advance    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ ledgerline-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌─────────────┐  ┌──────────┐  │   │
//! │  │   │   types   │  │   money   │  │ attribution │  │commission│  │   │
//! │  │   │Transaction│  │   Money   │  │ staff chain │  │  engine  │  │   │
//! │  │   │   Order   │  │   Rate    │  │ customer    │  │ tips/fees│  │   │
//! │  │   └───────────┘  └───────────┘  └─────────────┘  └──────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ledgerline-store (SQLite state)                    │   │
//! │  │        entity caches, sync cursor, processed_rows               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Transaction, Order, ProcessedRow, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`rates`] - Rate normalization and the rate-resolution hierarchy
//! - [`attribution`] - Staff and customer resolution chains
//! - [`commission`] - The commission engine
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Infallible rows**: data-quality problems normalize to 0/empty; a bad
//!    numeric field must never abort a row, so nothing in this crate returns
//!    a row-level error

// =============================================================================
// Module Declarations
// =============================================================================

pub mod attribution;
pub mod commission;
pub mod money;
pub mod rates;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use ledgerline_core::Money` instead of
// `use ledgerline_core::money::Money`

pub use attribution::{
    resolve_customer_name, resolve_staff, unattributed_booking_id, AttributionInput,
    StaffAttribution,
};
pub use commission::{CommissionEngine, CommissionPolicy, TipStrategy};
pub use money::Money;
pub use rates::{Rate, RateBook, RateOverride, RateSource, ResolvedRate, StaffRates};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of ids per remote batch-retrieve call.
///
/// The upstream ledger rejects larger id lists; everything above this is
/// chunked and issued serially.
pub const MAX_BATCH_IDS: usize = 100;
