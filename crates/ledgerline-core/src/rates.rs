//! # Commission Rates
//!
//! Rate normalization and the commission-rate resolution hierarchy.
//!
//! ## Rate Normalization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Operators enter rates in whatever form they think in:                  │
//! │                                                                         │
//! │    0.4      → fraction          → 40%                                   │
//! │    40       → whole percentage  → 40%                                   │
//! │    "40%"    → percent string    → 40%                                   │
//! │    ""/null  → absent            → 0%                                    │
//! │                                                                         │
//! │  All of them normalize to the closed interval [0, 1], carried as       │
//! │  integer basis points (4000 bps = 40%). A value of exactly 1 reads     │
//! │  as the fraction 1.0; only values strictly greater than 1 are          │
//! │  treated as whole percentages.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Resolution Hierarchy
//! For each line-item group (service, product) the applicable rate is the
//! first match in an explicit, ordered strategy list:
//!
//! 1. item-name override (substring match against the group label)
//! 2. the staff member's configured rate
//! 3. the system-wide default
//!
//! Service and product rates resolve independently.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::types::ItemCategory;

// =============================================================================
// Rate
// =============================================================================

/// A commission rate, normalized to [0, 1] and carried in basis points.
///
/// 1 basis point = 0.01% = 1/10000, so 4000 bps = 40%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Rate(u32);

impl Rate {
    /// Creates a rate from basis points, clamped to 100%.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        if bps > 10_000 {
            Rate(10_000)
        } else {
            Rate(bps)
        }
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a fraction in [0, 1] (for display only).
    #[inline]
    pub fn as_fraction(&self) -> f64 {
        self.0 as f64 / 10_000.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Normalizes a bare number: fractions pass through, values strictly
    /// greater than 1 are whole percentages. Non-finite and negative
    /// inputs normalize to zero.
    pub fn from_number(value: f64) -> Self {
        if !value.is_finite() || value <= 0.0 {
            return Rate::zero();
        }
        let fraction = if value > 1.0 { value / 100.0 } else { value };
        Rate::from_bps((fraction * 10_000.0).round() as u32)
    }

    /// Normalizes a loosely-typed string: optional `%` suffix, surrounding
    /// whitespace, blank or unparseable input normalizes to zero.
    ///
    /// A `%` suffix always means a percentage: `"0.5%"` is half a percent,
    /// not fifty percent.
    pub fn from_loose_str(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Rate::zero();
        }
        if let Some(stripped) = trimmed.strip_suffix('%') {
            return match stripped.trim().parse::<f64>() {
                Ok(pct) if pct.is_finite() && pct > 0.0 => {
                    Rate::from_bps((pct / 100.0 * 10_000.0).round() as u32)
                }
                _ => Rate::zero(),
            };
        }
        match trimmed.parse::<f64>() {
            Ok(n) => Rate::from_number(n),
            Err(_) => Rate::zero(),
        }
    }

    /// Normalizes a loosely-typed JSON value as found in upstream payloads
    /// and operator-edited tables: a number, a percent-suffixed string, or
    /// nothing at all.
    pub fn normalize(value: Option<&serde_json::Value>) -> Self {
        match value {
            None | Some(serde_json::Value::Null) => Rate::zero(),
            Some(serde_json::Value::Number(n)) => Rate::from_number(n.as_f64().unwrap_or(0.0)),
            Some(serde_json::Value::String(s)) => Rate::from_loose_str(s),
            Some(_) => Rate::zero(),
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0 as f64 / 100.0)
    }
}

// =============================================================================
// Staff Rates
// =============================================================================

/// A staff member's configured commission rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StaffRates {
    /// Commission fraction applied to service sales.
    pub service: Rate,

    /// Commission fraction applied to product sales.
    pub product: Rate,
}

/// An item-name rate override.
///
/// Matched by case-insensitive substring against the concatenated,
/// de-duplicated item-name label of a line-item group. Consulted before
/// any staff-configured rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateOverride {
    /// Substring to look for in the group label.
    pub pattern: String,

    /// Override for the service-rate resolution, if any.
    pub service: Option<Rate>,

    /// Override for the product-rate resolution, if any.
    pub product: Option<Rate>,
}

// =============================================================================
// Rate Book
// =============================================================================

/// Which strategy in the hierarchy produced a resolved rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSource {
    /// An item-name override matched the group label.
    ItemOverride,
    /// The staff member's configured rate.
    StaffConfigured,
    /// The system-wide fallback.
    Default,
}

/// A resolved rate together with the strategy that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRate {
    pub rate: Rate,
    pub source: RateSource,
}

/// The current commission-rate configuration: per-staff rates keyed by
/// display name, an identity-alias table (external staff id → display
/// name), item-name overrides, and the fallback rate.
///
/// Read-only for the duration of a run.
#[derive(Debug, Clone, Default)]
pub struct RateBook {
    by_name: HashMap<String, StaffRates>,
    alias: HashMap<String, String>,
    overrides: Vec<RateOverride>,
    default_rate: Rate,
}

impl RateBook {
    /// Creates an empty rate book with the given fallback rate.
    pub fn new(default_rate: Rate) -> Self {
        RateBook {
            default_rate,
            ..Default::default()
        }
    }

    /// Adds a staff member's rates, optionally registering an external-id
    /// alias for them.
    pub fn insert_staff(
        &mut self,
        display_name: impl Into<String>,
        rates: StaffRates,
        external_id: Option<String>,
    ) {
        let display_name = display_name.into();
        if let Some(id) = external_id {
            if !id.is_empty() {
                self.alias.insert(id, display_name.clone());
            }
        }
        self.by_name.insert(display_name, rates);
    }

    /// Adds an item-name override. Overrides are consulted in insertion
    /// order; the first matching pattern wins.
    pub fn push_override(&mut self, entry: RateOverride) {
        self.overrides.push(entry);
    }

    /// Looks up the display name for an external staff id.
    ///
    /// The alias table always takes precedence over a cached name, so
    /// operators can relabel staff without waiting for cache expiry.
    pub fn alias_name(&self, staff_id: &str) -> Option<&str> {
        self.alias.get(staff_id).map(String::as_str)
    }

    /// Returns the fallback rate.
    pub fn default_rate(&self) -> Rate {
        self.default_rate
    }

    /// Resolves the rate for one line-item group.
    ///
    /// The hierarchy is an explicit ordered list; the first strategy that
    /// returns a rate wins. The trailing default always matches, so this
    /// never fails.
    pub fn resolve(&self, staff_name: &str, group_label: &str, group: ItemCategory) -> ResolvedRate {
        let chain = [
            (RateSource::ItemOverride, self.override_rate(group_label, group)),
            (RateSource::StaffConfigured, self.staff_rate(staff_name, group)),
            (RateSource::Default, Some(self.default_rate)),
        ];

        chain
            .into_iter()
            .find_map(|(source, rate)| rate.map(|rate| ResolvedRate { rate, source }))
            .unwrap_or(ResolvedRate {
                rate: self.default_rate,
                source: RateSource::Default,
            })
    }

    fn override_rate(&self, group_label: &str, group: ItemCategory) -> Option<Rate> {
        if group_label.is_empty() {
            return None;
        }
        let label = group_label.to_lowercase();
        self.overrides
            .iter()
            .filter(|o| label.contains(&o.pattern.to_lowercase()))
            .find_map(|o| match group {
                ItemCategory::Service => o.service,
                ItemCategory::Product => o.product,
            })
    }

    fn staff_rate(&self, staff_name: &str, group: ItemCategory) -> Option<Rate> {
        self.by_name.get(staff_name).map(|r| match group {
            ItemCategory::Service => r.service,
            ItemCategory::Product => r.product,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_fraction() {
        assert_eq!(Rate::normalize(Some(&json!(0.5))).as_fraction(), 0.5);
        assert_eq!(Rate::normalize(Some(&json!(0.4))).bps(), 4_000);
    }

    #[test]
    fn test_normalize_whole_percentage() {
        assert_eq!(Rate::normalize(Some(&json!(50))).as_fraction(), 0.5);
        assert_eq!(Rate::normalize(Some(&json!(40.0))).bps(), 4_000);
    }

    #[test]
    fn test_normalize_percent_string() {
        assert_eq!(Rate::normalize(Some(&json!("50%"))).as_fraction(), 0.5);
        assert_eq!(Rate::normalize(Some(&json!("8.25%"))).bps(), 825);
        // A percent suffix always means percent, even below 1
        assert_eq!(Rate::normalize(Some(&json!("0.5%"))).bps(), 50);
    }

    #[test]
    fn test_normalize_absent() {
        assert_eq!(Rate::normalize(Some(&json!(""))).bps(), 0);
        assert_eq!(Rate::normalize(Some(&serde_json::Value::Null)).bps(), 0);
        assert_eq!(Rate::normalize(None).bps(), 0);
    }

    #[test]
    fn test_normalize_garbage() {
        assert_eq!(Rate::normalize(Some(&json!("forty"))).bps(), 0);
        assert_eq!(Rate::normalize(Some(&json!(-5))).bps(), 0);
        assert_eq!(Rate::normalize(Some(&json!([1, 2]))).bps(), 0);
    }

    #[test]
    fn test_one_is_full_fraction() {
        // Exactly 1 reads as 100%, not a 1% whole percentage
        assert_eq!(Rate::from_number(1.0).bps(), 10_000);
        assert_eq!(Rate::from_number(1.5).bps(), 150);
    }

    #[test]
    fn test_clamp_to_full() {
        assert_eq!(Rate::from_bps(25_000).bps(), 10_000);
    }

    fn sample_book() -> RateBook {
        let mut book = RateBook::new(Rate::zero());
        book.insert_staff(
            "Dana",
            StaffRates {
                service: Rate::from_bps(4_000),
                product: Rate::from_bps(1_000),
            },
            Some("EMP-7".to_string()),
        );
        book.push_override(RateOverride {
            pattern: "gift card".to_string(),
            service: Some(Rate::zero()),
            product: Some(Rate::zero()),
        });
        book
    }

    #[test]
    fn test_resolve_staff_configured() {
        let book = sample_book();
        let resolved = book.resolve("Dana", "Haircut", ItemCategory::Service);
        assert_eq!(resolved.rate.bps(), 4_000);
        assert_eq!(resolved.source, RateSource::StaffConfigured);
    }

    #[test]
    fn test_resolve_override_beats_staff_rate() {
        let book = sample_book();
        let resolved = book.resolve("Dana", "Gift Card $50", ItemCategory::Product);
        assert_eq!(resolved.rate.bps(), 0);
        assert_eq!(resolved.source, RateSource::ItemOverride);
    }

    #[test]
    fn test_resolve_unknown_staff_falls_back() {
        let book = sample_book();
        let resolved = book.resolve("Nobody", "Haircut", ItemCategory::Service);
        assert_eq!(resolved.rate, book.default_rate());
        assert_eq!(resolved.source, RateSource::Default);
    }

    #[test]
    fn test_alias_lookup() {
        let book = sample_book();
        assert_eq!(book.alias_name("EMP-7"), Some("Dana"));
        assert_eq!(book.alias_name("EMP-9"), None);
    }
}
