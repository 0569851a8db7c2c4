//! # Domain Types
//!
//! Core domain types used throughout Ledgerline.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  Transaction    │   │     Order       │   │  CatalogEntry   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (remote)    │   │  id (remote)    │   │  item_name      │       │
//! │  │  amount_cents   │   │  line_items[]   │   │  category       │       │
//! │  │  status         │   │  booking_id?    │   └─────────────────┘       │
//! │  │  order_id?      │   │  legacy_staff?  │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ ProcessedRow    │   │   Provenance    │   │TransactionStatus│       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  one per tx id  │   │  FromBooking    │   │  Completed      │       │
//! │  │  full breakdown │   │  FromPayment    │   │  Refunded       │       │
//! │  └─────────────────┘   │  FromOrderLegacy│   │  Voided         │       │
//! │                        │  StaffMissing   │   │  Other          │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All monetary fields are i64 minor units (cents); `Money` accessors are
//! provided where arithmetic happens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::money::Money;

// =============================================================================
// Transaction Status
// =============================================================================

/// The lifecycle status of a remote payment transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Payment completed successfully.
    Completed,
    /// Payment was refunded after completion.
    Refunded,
    /// Payment was voided before capture.
    Voided,
    /// Any status the upstream schema knows and we do not.
    #[default]
    Other,
}

impl TransactionStatus {
    /// Stable text form used in the output table.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "Completed",
            TransactionStatus::Refunded => "Refunded",
            TransactionStatus::Voided => "Voided",
            TransactionStatus::Other => "Other",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = std::convert::Infallible;

    /// Case-insensitive; unknown statuses map to `Other` rather than
    /// failing a row.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "completed" | "approved" | "captured" => TransactionStatus::Completed,
            "refunded" => TransactionStatus::Refunded,
            "voided" | "canceled" | "cancelled" | "failed" => TransactionStatus::Voided,
            _ => TransactionStatus::Other,
        })
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// One external payment event, immutable once fetched within a run.
///
/// Identified by `id` across runs for the idempotent merge into the
/// output table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Remote payment id — primary key for output rows.
    pub id: String,

    /// When the payment was created upstream.
    pub created_at: DateTime<Utc>,

    /// When the payment was last updated upstream (sync windows are keyed
    /// on this, not on created_at).
    pub updated_at: DateTime<Utc>,

    /// Gross amount paid, minor units.
    pub amount_cents: i64,

    /// Tip tendered, minor units.
    pub tip_cents: i64,

    /// Amount refunded so far, minor units.
    pub refunded_cents: i64,

    /// Processor fee, minor units.
    pub processing_fee_cents: i64,

    /// Lifecycle status.
    pub status: TransactionStatus,

    /// Order carrying the purchased line items, if any.
    pub order_id: Option<String>,

    /// Staff member recorded on the payment itself, if any.
    pub staff_id: Option<String>,

    /// Customer profile reference, if any.
    pub customer_id: Option<String>,

    /// Name reconstructed from billing address fields, if present.
    pub billing_name: Option<String>,

    /// Name reconstructed from shipping address fields, if present.
    pub shipping_name: Option<String>,

    /// Cardholder name when payment was card-based.
    pub card_holder: Option<String>,

    /// Buyer email address, if present.
    pub buyer_email: Option<String>,
}

impl Transaction {
    /// Gross amount paid.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Tip tendered.
    #[inline]
    pub fn tip(&self) -> Money {
        Money::from_cents(self.tip_cents)
    }

    /// Amount refunded.
    #[inline]
    pub fn refunded(&self) -> Money {
        Money::from_cents(self.refunded_cents)
    }

    /// Processor fee.
    #[inline]
    pub fn processing_fee(&self) -> Money {
        Money::from_cents(self.processing_fee_cents)
    }
}

// =============================================================================
// Item Category
// =============================================================================

/// Whether a catalog item is a service or a retail product.
///
/// Commission rates differ between the two, so every line item is
/// assigned to exactly one group. Catalog ids never seen before default
/// to `Product`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Service,
    #[default]
    Product,
}

// =============================================================================
// Order & Line Items
// =============================================================================

/// A line item purchased under an order.
///
/// Category is not stored here; it comes from the catalog map at compute
/// time so a catalog recategorization applies to re-processed rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Catalog variation reference, if the upstream order carried one.
    pub catalog_id: Option<String>,

    /// Display name as sold.
    pub name: String,

    /// Gross sale amount, minor units.
    pub gross_cents: i64,

    /// Discount applied to this line, minor units.
    pub discount_cents: i64,

    /// Tax charged on this line, minor units.
    pub tax_cents: i64,
}

impl LineItem {
    /// Net sale amount for this line, clamped at zero.
    #[inline]
    pub fn net_sale(&self) -> Money {
        (Money::from_cents(self.gross_cents) - Money::from_cents(self.discount_cents))
            .clamp_non_negative()
    }
}

/// Line items purchased under a transaction.
///
/// Read-only; fetched in batches per run and never persisted, because
/// orders mutate upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    /// Remote order id.
    pub id: String,

    /// Ordered list of purchased line items.
    pub line_items: Vec<LineItem>,

    /// Order-level discount (on top of per-line discounts), minor units.
    pub discount_cents: i64,

    /// Aggregate service-charge/fee total, minor units.
    pub service_charge_cents: i64,

    /// Booking/appointment reference from fulfillment metadata, if any.
    pub booking_id: Option<String>,

    /// Legacy staff reference some upstream orders still carry.
    pub legacy_staff_id: Option<String>,

    /// Customer profile reference, if any.
    pub customer_id: Option<String>,
}

impl Order {
    /// Total discount across the order: the order-level aggregate plus
    /// every per-line discount.
    pub fn total_discount(&self) -> Money {
        let line_discounts: Money = self
            .line_items
            .iter()
            .map(|l| Money::from_cents(l.discount_cents))
            .sum();
        Money::from_cents(self.discount_cents) + line_discounts
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Maps a sellable variation id to its parent item's display name and
/// category. Fetched in batch, used only to enrich line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Parent item display name.
    pub item_name: String,

    /// Service vs. product flag.
    pub category: ItemCategory,
}

// =============================================================================
// Attribution Provenance
// =============================================================================

/// Which resolution step produced the staff attribution for a row.
///
/// Always emitted to the output table for auditability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    /// The order's booking reference had a known attribution.
    #[serde(rename = "from_booking")]
    FromBooking,
    /// The transaction itself carried a staff reference.
    #[serde(rename = "from_payment")]
    FromPayment,
    /// The order's legacy staff reference field.
    #[serde(rename = "from_order_legacy")]
    FromOrderLegacy,
    /// No chain step matched.
    #[serde(rename = "STAFF_MISSING")]
    StaffMissing,
}

impl Provenance {
    /// Stable text form used in the output table.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Provenance::FromBooking => "from_booking",
            Provenance::FromPayment => "from_payment",
            Provenance::FromOrderLegacy => "from_order_legacy",
            Provenance::StaffMissing => "STAFF_MISSING",
        }
    }

    /// True when no chain step resolved a staff member.
    pub const fn is_missing(&self) -> bool {
        matches!(self, Provenance::StaffMissing)
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provenance {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "from_booking" => Provenance::FromBooking,
            "from_payment" => Provenance::FromPayment,
            "from_order_legacy" => Provenance::FromOrderLegacy,
            _ => Provenance::StaffMissing,
        })
    }
}

// =============================================================================
// Processed Row
// =============================================================================

/// The output unit: one row per transaction id with every derived field.
///
/// ## Invariant
/// At most one row per transaction id in the output table; re-processing
/// the same id in a later run overwrites the existing row in place (e.g.
/// a refund applied after the original charge) rather than appending a
/// duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRow {
    /// Remote transaction id (output table primary key).
    pub transaction_id: String,

    /// When the payment occurred.
    pub occurred_at: DateTime<Utc>,

    /// Concatenated, de-duplicated service item names.
    pub service_label: String,

    /// Resolved staff display name ("" when attribution failed).
    pub staff_name: String,

    /// Whether processing-fee sharing was configured for this run.
    pub fee_shared: bool,

    /// Gross amount paid, minor units.
    pub amount_paid_cents: i64,

    /// Processor fee, minor units.
    pub processing_fee_cents: i64,

    /// Staff-side share of the processing fee, minor units.
    pub staff_fee_share_cents: i64,

    /// Service sales (clamped net), minor units.
    pub service_sales_cents: i64,

    /// Resolved service commission rate, basis points.
    pub service_rate_bps: u32,

    /// Staff service commission, minor units.
    pub service_commission_cents: i64,

    /// Tips passed through to staff, minor units.
    pub tips_cents: i64,

    /// Concatenated, de-duplicated product item names.
    pub product_label: String,

    /// Product sales (clamped net), minor units.
    pub product_sales_cents: i64,

    /// Resolved product commission rate, basis points.
    pub product_rate_bps: u32,

    /// Product commission, minor units.
    pub product_commission_cents: i64,

    /// Tax over product lines only, minor units.
    pub product_tax_cents: i64,

    /// Total discounts, minor units.
    pub discounts_cents: i64,

    /// Reserved for future use; always 0.
    pub other_adjustments_cents: i64,

    /// Total staff commission, minor units.
    pub total_commission_cents: i64,

    /// Net business take, minor units.
    pub net_take_cents: i64,

    /// Transaction status, carried through unmodified.
    pub status: TransactionStatus,

    /// Resolved customer display name ("" when unresolvable).
    pub customer_name: String,

    /// Which attribution step produced the staff assignment.
    pub provenance: Provenance,
}

impl ProcessedRow {
    /// Total staff commission.
    #[inline]
    pub fn total_commission(&self) -> Money {
        Money::from_cents(self.total_commission_cents)
    }

    /// Net business take.
    #[inline]
    pub fn net_take(&self) -> Money {
        Money::from_cents(self.net_take_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
