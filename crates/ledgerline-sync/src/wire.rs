//! # Wire Types
//!
//! Typed serde shapes for the remote ledger's JSON payloads, and their
//! conversions into domain types.
//!
//! The upstream API is dynamic and loosely typed; this module is the one
//! place that deals with it. Every field is optional-with-default at the
//! boundary, unknown fields are ignored, and unknown shapes default to a
//! safe value (0 for numerics, empty string for names, `Other` for
//! statuses, `Product` for categories) rather than propagating untyped
//! values or aborting a row.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

use ledgerline_core::{CatalogEntry, ItemCategory, LineItem, Order, Transaction, TransactionStatus};

// =============================================================================
// Shared Fragments
// =============================================================================

/// `{ "amount": 1234, "currency": "USD" }` — amounts are already minor units.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MoneyDto {
    pub amount: Option<i64>,
    pub currency: Option<String>,
}

impl MoneyDto {
    /// Minor units, defaulting absent/invalid amounts to 0.
    pub fn cents(&self) -> i64 {
        self.amount.unwrap_or(0)
    }
}

fn money_cents(money: &Option<MoneyDto>) -> i64 {
    money.as_ref().map(MoneyDto::cents).unwrap_or(0)
}

/// Billing/shipping address fragment; only the name parts matter here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddressDto {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl AddressDto {
    /// Reconstructs "First Last", or None when both parts are absent.
    pub fn full_name(&self) -> Option<String> {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        (!name.is_empty()).then_some(name)
    }
}

/// Parses an upstream RFC3339 timestamp, defaulting unparseable or
/// absent values to the Unix epoch so a malformed timestamp never
/// aborts a row.
fn parse_ts(value: Option<&str>) -> DateTime<Utc> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

// =============================================================================
// Payments
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CardDto {
    pub cardholder_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CardDetailsDto {
    pub card: Option<CardDto>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProcessingFeeDto {
    pub amount_money: Option<MoneyDto>,
}

/// One payment as returned by the transaction search.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaymentDto {
    pub id: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub status: Option<String>,
    pub amount_money: Option<MoneyDto>,
    pub tip_money: Option<MoneyDto>,
    pub refunded_money: Option<MoneyDto>,
    pub processing_fee: Vec<ProcessingFeeDto>,
    pub order_id: Option<String>,
    pub employee_id: Option<String>,
    pub customer_id: Option<String>,
    pub billing_address: Option<AddressDto>,
    pub shipping_address: Option<AddressDto>,
    pub card_details: Option<CardDetailsDto>,
    pub buyer_email_address: Option<String>,
}

impl From<PaymentDto> for Transaction {
    fn from(dto: PaymentDto) -> Self {
        let processing_fee_cents = dto
            .processing_fee
            .iter()
            .map(|f| money_cents(&f.amount_money))
            .sum();

        Transaction {
            created_at: parse_ts(dto.created_at.as_deref()),
            updated_at: parse_ts(dto.updated_at.as_deref()),
            amount_cents: money_cents(&dto.amount_money),
            tip_cents: money_cents(&dto.tip_money),
            refunded_cents: money_cents(&dto.refunded_money),
            processing_fee_cents,
            status: dto
                .status
                .as_deref()
                .unwrap_or("")
                .parse()
                .unwrap_or(TransactionStatus::Other),
            order_id: dto.order_id,
            staff_id: dto.employee_id,
            customer_id: dto.customer_id,
            billing_name: dto.billing_address.as_ref().and_then(AddressDto::full_name),
            shipping_name: dto.shipping_address.as_ref().and_then(AddressDto::full_name),
            card_holder: dto
                .card_details
                .and_then(|d| d.card)
                .and_then(|c| c.cardholder_name),
            buyer_email: dto.buyer_email_address,
            id: dto.id,
        }
    }
}

/// Response of the paginated transaction search.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchPaymentsResponse {
    pub payments: Vec<PaymentDto>,
    /// Opaque continuation cursor; absent on the last page.
    pub cursor: Option<String>,
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LineItemDto {
    pub catalog_object_id: Option<String>,
    pub name: Option<String>,
    pub gross_sales_money: Option<MoneyDto>,
    pub total_discount_money: Option<MoneyDto>,
    pub total_tax_money: Option<MoneyDto>,
}

impl From<LineItemDto> for LineItem {
    fn from(dto: LineItemDto) -> Self {
        LineItem {
            catalog_id: dto.catalog_object_id,
            name: dto.name.unwrap_or_default(),
            gross_cents: money_cents(&dto.gross_sales_money),
            discount_cents: money_cents(&dto.total_discount_money),
            tax_cents: money_cents(&dto.total_tax_money),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceChargeDto {
    pub total_money: Option<MoneyDto>,
}

/// Fulfillment fragment; its metadata may carry a booking reference.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FulfillmentDto {
    pub metadata: Option<HashMap<String, String>>,
}

/// One order as returned by the batch-retrieve endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrderDto {
    pub id: String,
    pub line_items: Vec<LineItemDto>,
    pub total_discount_money: Option<MoneyDto>,
    pub service_charges: Vec<ServiceChargeDto>,
    pub fulfillments: Vec<FulfillmentDto>,
    pub customer_id: Option<String>,
    /// Legacy staff reference some upstream orders still carry.
    pub employee_id: Option<String>,
}

impl From<OrderDto> for Order {
    fn from(dto: OrderDto) -> Self {
        let booking_id = dto
            .fulfillments
            .iter()
            .filter_map(|f| f.metadata.as_ref())
            .find_map(|m| m.get("booking_id").cloned())
            .filter(|id| !id.is_empty());

        Order {
            line_items: dto.line_items.into_iter().map(LineItem::from).collect(),
            // Order-level only; per-line discounts already sit on the lines.
            discount_cents: money_cents(&dto.total_discount_money),
            service_charge_cents: dto
                .service_charges
                .iter()
                .map(|c| money_cents(&c.total_money))
                .sum(),
            booking_id,
            legacy_staff_id: dto.employee_id,
            customer_id: dto.customer_id,
            id: dto.id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BatchOrdersResponse {
    pub orders: Vec<OrderDto>,
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ItemVariationDataDto {
    pub item_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ItemDataDto {
    pub name: Option<String>,
    pub product_type: Option<String>,
}

/// One catalog object: either a sellable variation or its parent item.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogObjectDto {
    pub id: String,
    #[serde(rename = "type")]
    pub object_type: Option<String>,
    pub item_variation_data: Option<ItemVariationDataDto>,
    pub item_data: Option<ItemDataDto>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BatchCatalogResponse {
    /// The requested variation objects.
    pub objects: Vec<CatalogObjectDto>,
    /// Parent items, returned because the request asks for related objects.
    pub related_objects: Vec<CatalogObjectDto>,
}

impl BatchCatalogResponse {
    /// Builds the variation-id → CatalogEntry map.
    ///
    /// A variation whose parent item is missing from related_objects
    /// degrades to a Product entry labeled with the variation id.
    pub fn into_catalog_map(self) -> HashMap<String, CatalogEntry> {
        let items: HashMap<String, &CatalogObjectDto> = self
            .related_objects
            .iter()
            .filter(|o| o.object_type.as_deref() == Some("ITEM"))
            .map(|o| (o.id.clone(), o))
            .collect();

        self.objects
            .iter()
            .filter(|o| o.object_type.as_deref() == Some("ITEM_VARIATION"))
            .map(|variation| {
                let parent = variation
                    .item_variation_data
                    .as_ref()
                    .and_then(|v| v.item_id.as_ref())
                    .and_then(|item_id| items.get(item_id));

                let entry = match parent.and_then(|p| p.item_data.as_ref()) {
                    Some(data) => CatalogEntry {
                        item_name: data.name.clone().unwrap_or_else(|| variation.id.clone()),
                        category: category_from_product_type(data.product_type.as_deref()),
                    },
                    None => CatalogEntry {
                        item_name: variation.id.clone(),
                        category: ItemCategory::Product,
                    },
                };
                (variation.id.clone(), entry)
            })
            .collect()
    }
}

/// Upstream product-type flag → service/product category.
fn category_from_product_type(product_type: Option<&str>) -> ItemCategory {
    match product_type {
        Some("APPOINTMENTS_SERVICE") => ItemCategory::Service,
        _ => ItemCategory::Product,
    }
}

// =============================================================================
// Customers
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CustomerDto {
    pub id: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub company_name: Option<String>,
    pub email_address: Option<String>,
}

impl CustomerDto {
    /// Display name: "Given Family", else company, else email, else "".
    pub fn display_name(&self) -> String {
        let personal = [self.given_name.as_deref(), self.family_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !personal.is_empty() {
            return personal;
        }
        if let Some(company) = self.company_name.as_deref().map(str::trim) {
            if !company.is_empty() {
                return company.to_string();
            }
        }
        self.email_address.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BatchCustomersResponse {
    pub customers: Vec<CustomerDto>,
}

// =============================================================================
// Staff & Bookings (single-entity lookups)
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TeamMemberDto {
    pub id: String,
    pub display_name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

impl TeamMemberDto {
    /// Display name, preferring the explicit display_name field.
    pub fn name(&self) -> String {
        if let Some(name) = self.display_name.as_deref().map(str::trim) {
            if !name.is_empty() {
                return name.to_string();
            }
        }
        [self.given_name.as_deref(), self.family_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RetrieveTeamMemberResponse {
    pub team_member: Option<TeamMemberDto>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppointmentSegmentDto {
    pub team_member_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookingDto {
    pub id: String,
    pub appointment_segments: Vec<AppointmentSegmentDto>,
}

impl BookingDto {
    /// The staff member recorded as performing the booking, if any.
    /// Segments without a usable id are skipped.
    pub fn staff_id(&self) -> Option<String> {
        self.appointment_segments.iter().find_map(|s| {
            s.team_member_id
                .as_deref()
                .filter(|id| !id.is_empty())
                .map(str::to_string)
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RetrieveBookingResponse {
    pub booking: Option<BookingDto>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_conversion() {
        let json = r#"{
            "id": "pay-1",
            "created_at": "2025-06-01T10:00:00Z",
            "updated_at": "2025-06-01T10:05:00Z",
            "status": "COMPLETED",
            "amount_money": { "amount": 16000, "currency": "USD" },
            "tip_money": { "amount": 1000, "currency": "USD" },
            "processing_fee": [
                { "amount_money": { "amount": 300, "currency": "USD" } },
                { "amount_money": { "amount": 120, "currency": "USD" } }
            ],
            "order_id": "ord-1",
            "employee_id": "staff-1",
            "billing_address": { "first_name": "Alex", "last_name": "Doe" },
            "card_details": { "card": { "cardholder_name": "ALEX DOE" } },
            "unknown_future_field": { "nested": true }
        }"#;

        let dto: PaymentDto = serde_json::from_str(json).unwrap();
        let tx = Transaction::from(dto);

        assert_eq!(tx.id, "pay-1");
        assert_eq!(tx.amount_cents, 16_000);
        assert_eq!(tx.tip_cents, 1_000);
        assert_eq!(tx.refunded_cents, 0);
        assert_eq!(tx.processing_fee_cents, 420);
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.staff_id.as_deref(), Some("staff-1"));
        assert_eq!(tx.billing_name.as_deref(), Some("Alex Doe"));
        assert_eq!(tx.card_holder.as_deref(), Some("ALEX DOE"));
    }

    #[test]
    fn test_payment_defaults_never_abort() {
        // Bare minimum payload: everything defaults, nothing errors.
        let dto: PaymentDto = serde_json::from_str(r#"{ "id": "pay-2" }"#).unwrap();
        let tx = Transaction::from(dto);
        assert_eq!(tx.amount_cents, 0);
        assert_eq!(tx.status, TransactionStatus::Other);
        assert_eq!(tx.created_at, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_unknown_status_maps_to_other() {
        let dto: PaymentDto =
            serde_json::from_str(r#"{ "id": "p", "status": "SOMETHING_NEW" }"#).unwrap();
        assert_eq!(Transaction::from(dto).status, TransactionStatus::Other);
    }

    #[test]
    fn test_order_conversion_with_booking_metadata() {
        let json = r#"{
            "id": "ord-1",
            "line_items": [
                {
                    "catalog_object_id": "var-1",
                    "name": "Haircut",
                    "gross_sales_money": { "amount": 10000 },
                    "total_discount_money": { "amount": 500 },
                    "total_tax_money": { "amount": 0 }
                }
            ],
            "total_discount_money": { "amount": 200 },
            "service_charges": [ { "total_money": { "amount": 150 } } ],
            "fulfillments": [
                { "metadata": { "note": "walk-in" } },
                { "metadata": { "booking_id": "appt-9" } }
            ],
            "customer_id": "cust-1",
            "employee_id": "staff-legacy"
        }"#;

        let order = Order::from(serde_json::from_str::<OrderDto>(json).unwrap());
        assert_eq!(order.id, "ord-1");
        assert_eq!(order.line_items.len(), 1);
        assert_eq!(order.line_items[0].gross_cents, 10_000);
        assert_eq!(order.discount_cents, 200);
        assert_eq!(order.service_charge_cents, 150);
        assert_eq!(order.booking_id.as_deref(), Some("appt-9"));
        assert_eq!(order.legacy_staff_id.as_deref(), Some("staff-legacy"));
    }

    #[test]
    fn test_catalog_map_with_related_items() {
        let json = r#"{
            "objects": [
                {
                    "id": "var-1",
                    "type": "ITEM_VARIATION",
                    "item_variation_data": { "item_id": "item-1" }
                },
                {
                    "id": "var-2",
                    "type": "ITEM_VARIATION",
                    "item_variation_data": { "item_id": "item-orphan" }
                }
            ],
            "related_objects": [
                {
                    "id": "item-1",
                    "type": "ITEM",
                    "item_data": { "name": "Haircut", "product_type": "APPOINTMENTS_SERVICE" }
                }
            ]
        }"#;

        let map = serde_json::from_str::<BatchCatalogResponse>(json)
            .unwrap()
            .into_catalog_map();

        let haircut = map.get("var-1").unwrap();
        assert_eq!(haircut.item_name, "Haircut");
        assert_eq!(haircut.category, ItemCategory::Service);

        // Orphan variation degrades to a product labeled by its own id.
        let orphan = map.get("var-2").unwrap();
        assert_eq!(orphan.item_name, "var-2");
        assert_eq!(orphan.category, ItemCategory::Product);
    }

    #[test]
    fn test_customer_display_name_fallbacks() {
        let full: CustomerDto = serde_json::from_str(
            r#"{ "id": "c1", "given_name": "Alex", "family_name": "Doe" }"#,
        )
        .unwrap();
        assert_eq!(full.display_name(), "Alex Doe");

        let company: CustomerDto =
            serde_json::from_str(r#"{ "id": "c2", "company_name": "Acme LLC" }"#).unwrap();
        assert_eq!(company.display_name(), "Acme LLC");

        let email: CustomerDto =
            serde_json::from_str(r#"{ "id": "c3", "email_address": "a@example.com" }"#).unwrap();
        assert_eq!(email.display_name(), "a@example.com");

        let nothing: CustomerDto = serde_json::from_str(r#"{ "id": "c4" }"#).unwrap();
        assert_eq!(nothing.display_name(), "");
    }

    #[test]
    fn test_booking_staff_id() {
        let booking: BookingDto = serde_json::from_str(
            r#"{
                "id": "appt-1",
                "appointment_segments": [
                    { "team_member_id": "" },
                    { "team_member_id": "staff-7" }
                ]
            }"#,
        )
        .unwrap();
        // Empty segment ids are skipped rather than shadowing later ones
        assert_eq!(booking.staff_id().as_deref(), Some("staff-7"));
    }

    #[test]
    fn test_team_member_name_prefers_display_name() {
        let member: TeamMemberDto = serde_json::from_str(
            r#"{ "id": "s1", "display_name": "Dana R.", "given_name": "Dana", "family_name": "Roe" }"#,
        )
        .unwrap();
        assert_eq!(member.name(), "Dana R.");

        let parts: TeamMemberDto =
            serde_json::from_str(r#"{ "id": "s2", "given_name": "Dana", "family_name": "Roe" }"#)
                .unwrap();
        assert_eq!(parts.name(), "Dana Roe");
    }

    #[test]
    fn test_search_response_cursor() {
        let with: SearchPaymentsResponse =
            serde_json::from_str(r#"{ "payments": [], "cursor": "abc" }"#).unwrap();
        assert_eq!(with.cursor.as_deref(), Some("abc"));

        let without: SearchPaymentsResponse = serde_json::from_str(r#"{ "payments": [] }"#).unwrap();
        assert!(without.cursor.is_none());
    }
}
