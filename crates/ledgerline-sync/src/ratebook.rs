//! # Rate Source Loader
//!
//! Loads the commission-rate configuration — per-staff rates, the
//! identity-alias table, and item-name overrides — from a TOML table
//! into a [`RateBook`]. Read once per run; the book is read-only after.
//!
//! ## Rate Table Format
//! ```toml
//! # rates.toml
//! default_rate = 0            # fallback for unknown staff
//!
//! [[staff]]
//! name = "Dana"               # display name (keys the book)
//! staff_id = "EMP-7"          # external id → alias resolution
//! service_rate = "40%"        # any normalizable form
//! product_rate = 10
//!
//! [[override]]
//! pattern = "gift card"       # substring match against group labels
//! service_rate = 0
//! product_rate = 0
//! ```

use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

use ledgerline_core::{Rate, RateBook, RateOverride, StaffRates};

use crate::config::rate_from_toml;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// File Shapes
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct RateBookFile {
    #[serde(default)]
    default_rate: Option<toml::Value>,

    #[serde(default)]
    staff: Vec<StaffEntry>,

    #[serde(default, rename = "override")]
    overrides: Vec<OverrideEntry>,
}

#[derive(Debug, Deserialize)]
struct StaffEntry {
    name: String,
    #[serde(default)]
    staff_id: Option<String>,
    #[serde(default)]
    service_rate: Option<toml::Value>,
    #[serde(default)]
    product_rate: Option<toml::Value>,
}

#[derive(Debug, Deserialize)]
struct OverrideEntry {
    pattern: String,
    #[serde(default)]
    service_rate: Option<toml::Value>,
    #[serde(default)]
    product_rate: Option<toml::Value>,
}

// =============================================================================
// Loading
// =============================================================================

/// Parses a rate table from TOML text.
pub fn parse_rate_book(contents: &str) -> SyncResult<RateBook> {
    let file: RateBookFile =
        toml::from_str(contents).map_err(|e| SyncError::RateSource(e.to_string()))?;

    let mut book = RateBook::new(rate_from_toml(file.default_rate.as_ref()));

    for entry in file.staff {
        let rates = StaffRates {
            service: rate_from_toml(entry.service_rate.as_ref()),
            product: rate_from_toml(entry.product_rate.as_ref()),
        };
        book.insert_staff(entry.name, rates, entry.staff_id);
    }

    for entry in file.overrides {
        if entry.pattern.trim().is_empty() {
            warn!("Skipping rate override with empty pattern");
            continue;
        }
        book.push_override(RateOverride {
            pattern: entry.pattern,
            // None means "no override for this group", not a zero rate.
            service: entry.service_rate.as_ref().map(|v| rate_from_toml(Some(v))),
            product: entry.product_rate.as_ref().map(|v| rate_from_toml(Some(v))),
        });
    }

    Ok(book)
}

/// Loads the rate table from disk.
///
/// A missing file is not an error: runs are allowed before any rates are
/// configured, every staff member then falls to the default (0). A file
/// that exists but cannot be read or parsed IS an error — silently
/// paying zero commission because of a typo would be worse than failing
/// the run.
pub fn load_rate_book(path: &Path) -> SyncResult<RateBook> {
    if !path.exists() {
        warn!(?path, "Rate table not found; using empty rate book");
        return Ok(RateBook::new(Rate::zero()));
    }

    let contents =
        std::fs::read_to_string(path).map_err(|e| SyncError::RateSource(e.to_string()))?;
    let book = parse_rate_book(&contents)?;
    info!(?path, "Rate table loaded");
    Ok(book)
}

// =============================================================================
// Unit Tests
// =============================================================================
