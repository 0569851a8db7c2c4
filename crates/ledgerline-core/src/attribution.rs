//! # Attribution Resolver
//!
//! Determines the responsible staff member and the customer identity for
//! a transaction, using fixed priority chains over the available signals.
//!
//! The staff chain is an explicit ordered list of strategies rather than
//! nested conditionals: the priority order is a visible, testable data
//! structure.

use std::collections::HashMap;

use crate::types::{Order, Provenance, Transaction};

// =============================================================================
// Staff Attribution
// =============================================================================

/// Everything the staff chain is allowed to look at.
#[derive(Debug, Clone, Copy)]
pub struct AttributionInput<'a> {
    pub transaction: &'a Transaction,
    pub order: Option<&'a Order>,
    /// Booking/appointment id → staff id, from the persisted cache.
    pub booking_staff: &'a HashMap<String, String>,
}

/// The outcome of the staff chain: a staff id (empty when missing) and
/// the provenance tag that is always emitted to the output row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffAttribution {
    pub staff_id: String,
    pub provenance: Provenance,
}

type StaffStep = fn(&AttributionInput<'_>) -> Option<String>;

/// The staff-attribution priority chain, first match wins.
const STAFF_CHAIN: &[(Provenance, StaffStep)] = &[
    (Provenance::FromBooking, step_booking),
    (Provenance::FromPayment, step_payment),
    (Provenance::FromOrderLegacy, step_order_legacy),
];

fn step_booking(input: &AttributionInput<'_>) -> Option<String> {
    let booking_id = input.order.and_then(|o| o.booking_id.as_deref())?;
    input
        .booking_staff
        .get(booking_id)
        .filter(|staff| !staff.is_empty())
        .cloned()
}

fn step_payment(input: &AttributionInput<'_>) -> Option<String> {
    input
        .transaction
        .staff_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn step_order_legacy(input: &AttributionInput<'_>) -> Option<String> {
    input
        .order
        .and_then(|o| o.legacy_staff_id.as_deref())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Resolves the responsible staff member for a transaction.
///
/// Priority: booking attribution → payment staff reference → order legacy
/// staff reference → `STAFF_MISSING` with an empty staff id.
pub fn resolve_staff(input: &AttributionInput<'_>) -> StaffAttribution {
    for (provenance, step) in STAFF_CHAIN {
        if let Some(staff_id) = step(input) {
            return StaffAttribution {
                staff_id,
                provenance: *provenance,
            };
        }
    }
    StaffAttribution {
        staff_id: String::new(),
        provenance: Provenance::StaffMissing,
    }
}

/// True when the order carries a booking reference that has no known
/// attribution — the case worth a diagnostic deep dive.
pub fn unattributed_booking_id<'a>(
    order: Option<&'a Order>,
    booking_staff: &HashMap<String, String>,
) -> Option<&'a str> {
    let booking_id = order.and_then(|o| o.booking_id.as_deref())?;
    match booking_staff.get(booking_id) {
        Some(staff) if !staff.is_empty() => None,
        _ => Some(booking_id),
    }
}

// =============================================================================
// Customer Name
// =============================================================================

/// Resolves a customer display name for the output row.
///
/// Priority: a resolved customer-profile name for the transaction's
/// customer reference, then the order's; a name from billing/shipping
/// address fields; the cardholder name; the buyer email; empty string.
///
/// Cached empty-string sentinels ("looked up, found nothing") do not
/// satisfy the profile step.
pub fn resolve_customer_name(
    transaction: &Transaction,
    order: Option<&Order>,
    customer_names: &HashMap<String, String>,
) -> String {
    let profile_refs = [
        transaction.customer_id.as_deref(),
        order.and_then(|o| o.customer_id.as_deref()),
    ];
    for id in profile_refs.into_iter().flatten() {
        if let Some(name) = customer_names.get(id) {
            if !name.is_empty() {
                return name.clone();
            }
        }
    }

    let fallbacks = [
        transaction.billing_name.as_deref(),
        transaction.shipping_name.as_deref(),
        transaction.card_holder.as_deref(),
        transaction.buyer_email.as_deref(),
    ];
    fallbacks
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_default()
}

// =============================================================================
// Unit Tests
// =============================================================================
