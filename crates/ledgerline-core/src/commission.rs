//! # Commission Engine
//!
//! Computes the commission/earnings breakdown for one transaction.
//!
//! ## Computation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Commission Engine Flow                             │
//! │                                                                         │
//! │  Transaction + Order + Catalog Map                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. CATEGORIZE   line items → service group / product group            │
//! │       │          (unseen catalog ids default to product)               │
//! │       ▼                                                                 │
//! │  2. AGGREGATE    sales = Σ max(gross − discount, 0) per group          │
//! │       │          product tax = Σ tax over product lines only           │
//! │       ▼                                                                 │
//! │  3. RESOLVE      rate per group: override → staff rate → default       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  4. COMPUTE      commission = round(sales × rate), tips, fee share,    │
//! │       │          total commission, net business take                   │
//! │       ▼                                                                 │
//! │  ProcessedRow (one per transaction id)                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Absent or invalid numeric inputs are treated as 0, never as an error;
//! a data-quality problem must never abort a row.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::money::Money;
use crate::rates::{Rate, RateBook};
use crate::types::{
    CatalogEntry, ItemCategory, Order, ProcessedRow, Provenance, Transaction, TransactionStatus,
};

// =============================================================================
// Tip Strategy
// =============================================================================

/// How the tip figure on a row is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipStrategy {
    /// Read the transaction's tip field directly.
    #[default]
    Reported,

    /// Legacy residual reconstruction:
    /// `paid + discounts − service sales − product sales − product tax`.
    ///
    /// Inherently approximate — the residual can go negative or disagree
    /// with actually tendered tips. Kept as a distinct, named strategy for
    /// sources that never report a tip field.
    DerivedResidual,
}

// =============================================================================
// Commission Policy
// =============================================================================

/// Run-level knobs for the commission computation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CommissionPolicy {
    /// Staff share of the processing fee. Zero disables fee sharing.
    #[serde(default)]
    pub fee_share: Rate,

    /// Tip derivation strategy.
    #[serde(default)]
    pub tip_strategy: TipStrategy,

    /// Legacy behavior: force every monetary output to 0 on refunded
    /// transactions while preserving the status text.
    #[serde(default)]
    pub zero_refunded_amounts: bool,
}

// =============================================================================
// Commission Engine
// =============================================================================

/// One line-item group (service or product) after categorization.
#[derive(Debug, Default)]
struct Group {
    label: String,
    sales: Money,
    tax: Money,
}

/// Computes `ProcessedRow`s from resolved inputs.
///
/// The engine is pure: rates and policy are fixed at construction, every
/// call is deterministic, and nothing here performs I/O.
#[derive(Debug, Clone)]
pub struct CommissionEngine {
    book: RateBook,
    policy: CommissionPolicy,
}

impl CommissionEngine {
    /// Creates an engine over a rate book and policy.
    pub fn new(book: RateBook, policy: CommissionPolicy) -> Self {
        CommissionEngine { book, policy }
    }

    /// Read access to the rate book (alias resolution happens upstream).
    pub fn book(&self) -> &RateBook {
        &self.book
    }

    /// Computes the full earnings breakdown for one transaction.
    ///
    /// `staff_name` and `customer_name` arrive already resolved by the
    /// attribution chain; `provenance` is carried through to the row
    /// unmodified.
    pub fn compute_row(
        &self,
        transaction: &Transaction,
        order: Option<&Order>,
        catalog: &HashMap<String, CatalogEntry>,
        staff_name: &str,
        customer_name: String,
        provenance: Provenance,
    ) -> ProcessedRow {
        let (service, product) = categorize(order, catalog);

        let service_rate = self
            .book
            .resolve(staff_name, &service.label, ItemCategory::Service)
            .rate;
        let product_rate = self
            .book
            .resolve(staff_name, &product.label, ItemCategory::Product)
            .rate;

        let discounts = order.map(Order::total_discount).unwrap_or_default();
        let service_charges = order
            .map(|o| Money::from_cents(o.service_charge_cents))
            .unwrap_or_default();

        let tips = match self.policy.tip_strategy {
            TipStrategy::Reported => transaction.tip(),
            TipStrategy::DerivedResidual => {
                transaction.amount() + discounts - service.sales - product.sales - product.tax
            }
        };

        let service_commission = service.sales.apply_rate(service_rate);
        let product_commission = product.sales.apply_rate(product_rate);
        let staff_fee_share = transaction.processing_fee().apply_rate(self.policy.fee_share);

        let total_commission =
            service_commission + product_commission + tips - staff_fee_share;

        // Other adjustments is reserved at 0 for future use.
        let other_adjustments = Money::zero();
        let net_take = transaction.amount()
            - transaction.processing_fee()
            - total_commission
            - tips
            - transaction.refunded()
            + service_charges
            - discounts
            + other_adjustments;

        let mut row = ProcessedRow {
            transaction_id: transaction.id.clone(),
            occurred_at: transaction.created_at,
            service_label: service.label,
            staff_name: staff_name.to_string(),
            fee_shared: !self.policy.fee_share.is_zero(),
            amount_paid_cents: transaction.amount_cents,
            processing_fee_cents: transaction.processing_fee_cents,
            staff_fee_share_cents: staff_fee_share.cents(),
            service_sales_cents: service.sales.cents(),
            service_rate_bps: service_rate.bps(),
            service_commission_cents: service_commission.cents(),
            tips_cents: tips.cents(),
            product_label: product.label,
            product_sales_cents: product.sales.cents(),
            product_rate_bps: product_rate.bps(),
            product_commission_cents: product_commission.cents(),
            product_tax_cents: product.tax.cents(),
            discounts_cents: discounts.cents(),
            other_adjustments_cents: other_adjustments.cents(),
            total_commission_cents: total_commission.cents(),
            net_take_cents: net_take.cents(),
            status: transaction.status,
            customer_name,
            provenance,
        };

        if self.policy.zero_refunded_amounts && transaction.status == TransactionStatus::Refunded {
            zero_monetary_fields(&mut row);
        }

        row
    }
}

/// Splits an order's line items into service and product groups.
///
/// Labels are the concatenated, de-duplicated item names per group;
/// catalog entries supply the parent item name where known, otherwise
/// the line's own name is used.
fn categorize(order: Option<&Order>, catalog: &HashMap<String, CatalogEntry>) -> (Group, Group) {
    let mut service = Group::default();
    let mut product = Group::default();
    let mut service_names: Vec<String> = Vec::new();
    let mut product_names: Vec<String> = Vec::new();

    for line in order.map(|o| o.line_items.as_slice()).unwrap_or_default() {
        let entry = line.catalog_id.as_deref().and_then(|id| catalog.get(id));
        let category = entry.map(|e| e.category).unwrap_or_default();
        let display_name = entry
            .map(|e| e.item_name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(line.name.as_str());

        let (group, names) = match category {
            ItemCategory::Service => (&mut service, &mut service_names),
            ItemCategory::Product => (&mut product, &mut product_names),
        };

        group.sales += line.net_sale();
        if category == ItemCategory::Product {
            group.tax += Money::from_cents(line.tax_cents);
        }
        if !display_name.is_empty() && !names.iter().any(|n| n == display_name) {
            names.push(display_name.to_string());
        }
    }

    service.label = service_names.join(", ");
    product.label = product_names.join(", ");
    (service, product)
}

/// Forces every monetary field on a row to zero, leaving status, labels,
/// names, rates, and provenance intact.
fn zero_monetary_fields(row: &mut ProcessedRow) {
    row.amount_paid_cents = 0;
    row.processing_fee_cents = 0;
    row.staff_fee_share_cents = 0;
    row.service_sales_cents = 0;
    row.service_commission_cents = 0;
    row.tips_cents = 0;
    row.product_sales_cents = 0;
    row.product_commission_cents = 0;
    row.product_tax_cents = 0;
    row.discounts_cents = 0;
    row.other_adjustments_cents = 0;
    row.total_commission_cents = 0;
    row.net_take_cents = 0;
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::StaffRates;
    use chrono::Utc;

    fn transaction() -> Transaction {
        Transaction {
            id: "pay-1".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            amount_cents: 16_000,
            tip_cents: 1_000,
            refunded_cents: 0,
            processing_fee_cents: 420,
            status: TransactionStatus::Completed,
            order_id: Some("ord-1".into()),
            staff_id: Some("EMP-7".into()),
            customer_id: None,
            billing_name: None,
            shipping_name: None,
            card_holder: None,
            buyer_email: None,
        }
    }

    fn order() -> Order {
        Order {
            id: "ord-1".into(),
            line_items: vec![
                LineItemSpec::service("Haircut", 10_000, 0, 0).build(),
                LineItemSpec::product("Pomade", 5_000, 0, 450).build(),
            ],
            ..Default::default()
        }
    }

    /// Builder keeping line-item test fixtures short.
    struct LineItemSpec {
        id: &'static str,
        name: &'static str,
        gross: i64,
        discount: i64,
        tax: i64,
    }

    impl LineItemSpec {
        fn service(name: &'static str, gross: i64, discount: i64, tax: i64) -> Self {
            LineItemSpec { id: "cat-svc", name, gross, discount, tax }
        }

        fn product(name: &'static str, gross: i64, discount: i64, tax: i64) -> Self {
            LineItemSpec { id: "cat-prod", name, gross, discount, tax }
        }

        fn build(self) -> crate::types::LineItem {
            crate::types::LineItem {
                catalog_id: Some(self.id.to_string()),
                name: self.name.to_string(),
                gross_cents: self.gross,
                discount_cents: self.discount,
                tax_cents: self.tax,
            }
        }
    }

    fn catalog() -> HashMap<String, CatalogEntry> {
        HashMap::from([
            (
                "cat-svc".to_string(),
                CatalogEntry {
                    item_name: "Haircut".into(),
                    category: ItemCategory::Service,
                },
            ),
            (
                "cat-prod".to_string(),
                CatalogEntry {
                    item_name: "Pomade".into(),
                    category: ItemCategory::Product,
                },
            ),
        ])
    }

    fn engine() -> CommissionEngine {
        let mut book = RateBook::new(Rate::zero());
        book.insert_staff(
            "Dana",
            StaffRates {
                service: Rate::from_bps(4_000),
                product: Rate::from_bps(1_000),
            },
            Some("EMP-7".to_string()),
        );
        CommissionEngine::new(book, CommissionPolicy::default())
    }

    #[test]
    fn test_commission_arithmetic() {
        // Service sales 100.00 @ 40% → 40.00; product sales 50.00 @ 10% → 5.00
        let row = engine().compute_row(
            &transaction(),
            Some(&order()),
            &catalog(),
            "Dana",
            "Alex Doe".into(),
            Provenance::FromPayment,
        );

        assert_eq!(row.service_sales_cents, 10_000);
        assert_eq!(row.service_commission_cents, 4_000);
        assert_eq!(row.product_sales_cents, 5_000);
        assert_eq!(row.product_commission_cents, 500);
        assert_eq!(row.product_tax_cents, 450);
        // tips pass through; no fee sharing configured
        assert_eq!(row.tips_cents, 1_000);
        assert_eq!(row.staff_fee_share_cents, 0);
        assert!(!row.fee_shared);
        assert_eq!(row.total_commission_cents, 4_000 + 500 + 1_000);
        // net = 160.00 − 4.20 − 55.00 − 10.00 − 0 + 0 − 0 + 0
        assert_eq!(row.net_take_cents, 16_000 - 420 - 5_500 - 1_000);
        assert_eq!(row.status, TransactionStatus::Completed);
        assert_eq!(row.customer_name, "Alex Doe");
        assert_eq!(row.provenance, Provenance::FromPayment);
    }

    #[test]
    fn test_unseen_catalog_id_defaults_to_product() {
        let mut o = order();
        o.line_items.push(crate::types::LineItem {
            catalog_id: Some("cat-mystery".into()),
            name: "Mystery Item".into(),
            gross_cents: 2_000,
            discount_cents: 0,
            tax_cents: 100,
        });

        let row = engine().compute_row(
            &transaction(),
            Some(&o),
            &catalog(),
            "Dana",
            String::new(),
            Provenance::FromPayment,
        );

        assert_eq!(row.product_sales_cents, 7_000);
        assert_eq!(row.product_tax_cents, 550);
        assert!(row.product_label.contains("Mystery Item"));
    }

    #[test]
    fn test_labels_deduplicated() {
        let mut o = order();
        o.line_items.push(LineItemSpec::service("Haircut", 10_000, 0, 0).build());

        let row = engine().compute_row(
            &transaction(),
            Some(&o),
            &catalog(),
            "Dana",
            String::new(),
            Provenance::FromPayment,
        );

        assert_eq!(row.service_label, "Haircut");
        assert_eq!(row.service_sales_cents, 20_000);
    }

    #[test]
    fn test_fee_share() {
        let mut book = RateBook::new(Rate::zero());
        book.insert_staff("Dana", StaffRates::default(), None);
        let engine = CommissionEngine::new(
            book,
            CommissionPolicy {
                fee_share: Rate::from_bps(5_000),
                ..Default::default()
            },
        );

        let row = engine.compute_row(
            &transaction(),
            Some(&order()),
            &catalog(),
            "Dana",
            String::new(),
            Provenance::FromPayment,
        );

        // Half of the 4.20 processing fee lands on the staff side.
        assert_eq!(row.staff_fee_share_cents, 210);
        assert!(row.fee_shared);
        assert_eq!(row.total_commission_cents, 1_000 - 210);
    }

    #[test]
    fn test_derived_residual_tips() {
        let mut book = RateBook::new(Rate::zero());
        book.insert_staff("Dana", StaffRates::default(), None);
        let engine = CommissionEngine::new(
            book,
            CommissionPolicy {
                tip_strategy: TipStrategy::DerivedResidual,
                ..Default::default()
            },
        );

        // paid 160.00 + discounts 0 − service 100.00 − product 50.00 − tax 4.50
        let row = engine.compute_row(
            &transaction(),
            Some(&order()),
            &catalog(),
            "Dana",
            String::new(),
            Provenance::FromPayment,
        );
        assert_eq!(row.tips_cents, 16_000 - 10_000 - 5_000 - 450);
    }

    #[test]
    fn test_derived_residual_can_go_negative() {
        let mut tx = transaction();
        tx.amount_cents = 14_000; // under-collected vs. the order contents
        let engine = CommissionEngine::new(
            RateBook::new(Rate::zero()),
            CommissionPolicy {
                tip_strategy: TipStrategy::DerivedResidual,
                ..Default::default()
            },
        );

        let row = engine.compute_row(
            &tx,
            Some(&order()),
            &catalog(),
            "",
            String::new(),
            Provenance::StaffMissing,
        );
        assert_eq!(row.tips_cents, -1_450);
    }

    #[test]
    fn test_refund_zeroing_preserves_status() {
        let mut tx = transaction();
        tx.status = TransactionStatus::Refunded;
        tx.refunded_cents = 16_000;
        let engine = CommissionEngine::new(
            engine().book().clone(),
            CommissionPolicy {
                zero_refunded_amounts: true,
                ..Default::default()
            },
        );

        let row = engine.compute_row(
            &tx,
            Some(&order()),
            &catalog(),
            "Dana",
            "Alex Doe".into(),
            Provenance::FromPayment,
        );

        assert_eq!(row.status, TransactionStatus::Refunded);
        assert_eq!(row.customer_name, "Alex Doe");
        for cents in [
            row.amount_paid_cents,
            row.processing_fee_cents,
            row.staff_fee_share_cents,
            row.service_sales_cents,
            row.service_commission_cents,
            row.tips_cents,
            row.product_sales_cents,
            row.product_commission_cents,
            row.product_tax_cents,
            row.discounts_cents,
            row.other_adjustments_cents,
            row.total_commission_cents,
            row.net_take_cents,
        ] {
            assert_eq!(cents, 0);
        }
    }

    #[test]
    fn test_refunded_without_policy_flag_keeps_amounts() {
        let mut tx = transaction();
        tx.status = TransactionStatus::Refunded;
        let row = engine().compute_row(
            &tx,
            Some(&order()),
            &catalog(),
            "Dana",
            String::new(),
            Provenance::FromPayment,
        );
        assert_eq!(row.amount_paid_cents, 16_000);
    }

    #[test]
    fn test_no_order_produces_empty_groups() {
        let row = engine().compute_row(
            &transaction(),
            None,
            &catalog(),
            "Dana",
            String::new(),
            Provenance::FromPayment,
        );
        assert_eq!(row.service_sales_cents, 0);
        assert_eq!(row.product_sales_cents, 0);
        assert!(row.service_label.is_empty());
        // Commission is tips only.
        assert_eq!(row.total_commission_cents, 1_000);
    }
}
