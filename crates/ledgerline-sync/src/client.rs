//! # Remote Ledger Client
//!
//! REST client for the remote ledger: cursor-paginated transaction
//! search, chunked batch retrieves, and single-entity lookups.
//!
//! ## Rate-Limit Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every remote call in a run is SERIAL. Batch retrieves are chunked     │
//! │  to at most MAX_BATCH_IDS (100) ids per call, with a fixed pause       │
//! │  between consecutive calls. No parallel fan-out, no in-run retry:      │
//! │  the next scheduled run naturally retries unresolved work because      │
//! │  cache misses persist.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A non-2xx response surfaces as `SyncError::Remote { status, body }`;
//! whether that is fatal depends on the call site (see the engine).

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use ledgerline_core::{CatalogEntry, Order, Transaction, MAX_BATCH_IDS};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::source::LedgerSource;
use crate::wire;

/// REST client for the remote ledger API.
pub struct LedgerClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    api_version: String,
    page_size: u32,
    batch_pause: Duration,
}

impl LedgerClient {
    /// Creates a client from the loaded configuration.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.api.timeout())
            .build()?;

        Ok(LedgerClient {
            http,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            access_token: config.api.access_token.clone(),
            api_version: config.api.api_version.clone(),
            page_size: config.api.page_size,
            batch_pause: config.window.batch_pause(),
        })
    }

    /// Issues a POST with the bearer credential and API-version header,
    /// decoding the JSON response or surfacing a typed remote error.
    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> SyncResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "POST");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("Ledger-Version", &self.api_version)
            .json(body)
            .send()
            .await?;

        Self::decode(resp).await
    }

    /// Issues a GET with the standard headers.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> SyncResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .header("Ledger-Version", &self.api_version)
            .send()
            .await?;

        Self::decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> SyncResult<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Remote {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Pauses between consecutive chunked calls.
    async fn pace(&self) {
        if !self.batch_pause.is_zero() {
            tokio::time::sleep(self.batch_pause).await;
        }
    }
}

impl LedgerSource for LedgerClient {
    /// Fetches every transaction updated within the window, following the
    /// opaque continuation cursor until the remote stops returning one.
    async fn search_transactions(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SyncResult<Vec<Transaction>> {
        let mut transactions = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let mut body = json!({
                "begin_time": begin.to_rfc3339(),
                "end_time": end.to_rfc3339(),
                "sort_field": "updated_at",
                "sort_order": "ASC",
                "limit": self.page_size,
            });
            if let Some(ref c) = cursor {
                body["cursor"] = json!(c);
            }

            let page: wire::SearchPaymentsResponse =
                self.post_json("/v1/payments/search", &body).await?;
            pages += 1;
            transactions.extend(page.payments.into_iter().map(Transaction::from));

            match page.cursor {
                Some(next) if !next.is_empty() => {
                    cursor = Some(next);
                    self.pace().await;
                }
                _ => break,
            }
        }

        info!(
            count = transactions.len(),
            pages, "Fetched updated transactions"
        );
        Ok(transactions)
    }

    async fn batch_orders(&self, ids: &[String]) -> SyncResult<HashMap<String, Order>> {
        let mut orders = HashMap::with_capacity(ids.len());
        for (i, chunk) in ids.chunks(MAX_BATCH_IDS).enumerate() {
            if i > 0 {
                self.pace().await;
            }
            let body = json!({ "order_ids": chunk });
            let page: wire::BatchOrdersResponse =
                self.post_json("/v1/orders/batch-retrieve", &body).await?;
            for order in page.orders {
                orders.insert(order.id.clone(), Order::from(order));
            }
        }
        debug!(requested = ids.len(), found = orders.len(), "Fetched orders");
        Ok(orders)
    }

    async fn batch_catalog(&self, ids: &[String]) -> SyncResult<HashMap<String, CatalogEntry>> {
        let mut catalog = HashMap::with_capacity(ids.len());
        for (i, chunk) in ids.chunks(MAX_BATCH_IDS).enumerate() {
            if i > 0 {
                self.pace().await;
            }
            let body = json!({
                "object_ids": chunk,
                "include_related_objects": true,
            });
            let page: wire::BatchCatalogResponse =
                self.post_json("/v1/catalog/batch-retrieve", &body).await?;
            catalog.extend(page.into_catalog_map());
        }
        debug!(
            requested = ids.len(),
            found = catalog.len(),
            "Fetched catalog entries"
        );
        Ok(catalog)
    }

    async fn batch_customers(&self, ids: &[String]) -> SyncResult<HashMap<String, String>> {
        let mut names = HashMap::with_capacity(ids.len());
        for (i, chunk) in ids.chunks(MAX_BATCH_IDS).enumerate() {
            if i > 0 {
                self.pace().await;
            }
            let body = json!({ "customer_ids": chunk });
            let page: wire::BatchCustomersResponse =
                self.post_json("/v1/customers/batch-retrieve", &body).await?;
            for customer in page.customers {
                names.insert(customer.id.clone(), customer.display_name());
            }
        }
        debug!(
            requested = ids.len(),
            found = names.len(),
            "Fetched customer names"
        );
        Ok(names)
    }

    /// `Ok(None)` when the remote knows no such staff member; the caller
    /// caches that as an empty-string sentinel.
    async fn retrieve_staff_name(&self, id: &str) -> SyncResult<Option<String>> {
        let resp: SyncResult<wire::RetrieveTeamMemberResponse> =
            self.get_json(&format!("/v1/team-members/{id}")).await;
        match resp {
            Ok(body) => Ok(body.team_member.map(|m| m.name())),
            Err(e) if e.remote_status() == Some(404) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn retrieve_booking_staff(&self, id: &str) -> SyncResult<Option<String>> {
        let resp: SyncResult<wire::RetrieveBookingResponse> =
            self.get_json(&format!("/v1/bookings/{id}")).await;
        match resp {
            Ok(body) => Ok(body.booking.and_then(|b| b.staff_id())),
            Err(e) if e.remote_status() == Some(404) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;

    fn client() -> LedgerClient {
        let mut config = SyncConfig::default();
        config.api.access_token = "token".into();
        config.api.base_url = "https://ledger.test/".into();
        LedgerClient::new(&config).unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(client().base_url, "https://ledger.test");
    }

    #[test]
    fn test_pause_configured() {
        let c = client();
        assert_eq!(c.batch_pause, Duration::from_millis(200));
        assert_eq!(c.page_size, 100);
    }
}
