//! # Sync Error Types
//!
//! Error types for reconciliation runs.
//!
//! ## Error Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Sync Error Categories                              │
//! │                                                                         │
//! │  FATAL (aborts the run, cursor NOT advanced)                           │
//! │  ────────────────────────────────────────────                          │
//! │  • MissingCredential / InvalidConfig / ConfigLoadFailed                │
//! │  • Remote error on the primary transaction search                      │
//! │  • Database (output sink unreachable, merge failed)                    │
//! │  • RateSource (rate table unreadable)                                  │
//! │                                                                         │
//! │  RECOVERABLE-ENRICHMENT (logged, field left unresolved)                │
//! │  ───────────────────────────────────────────────────────               │
//! │  • The SAME Remote/Http variants, when raised by a best-effort         │
//! │    booking or staff lookup. Whether an error is fatal depends on       │
//! │    the call site, not the variant — the engine catches enrichment      │
//! │    failures and lets primary-path failures propagate with `?`.         │
//! │                                                                         │
//! │  DATA-QUALITY (never an error at all)                                  │
//! │  ─────────────────────────────────────                                 │
//! │  • Unparseable numerics and missing names normalize to 0/"" at the    │
//! │    wire boundary and in ledgerline-core.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering configuration, remote, and storage failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// No API credential configured.
    #[error("No API credential configured. Set LEDGERLINE_ACCESS_TOKEN or [api] access_token.")]
    MissingCredential,

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// The rate table could not be read or parsed.
    #[error("Failed to load rate table: {0}")]
    RateSource(String),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// The remote ledger returned a non-2xx response.
    #[error("remote ledger returned {status}: {body}")]
    Remote { status: u16, body: String },

    /// Transport-level HTTP failure (connect, timeout, TLS).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("Unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// The state store failed; the output sink is unreachable.
    #[error("State store error: {0}")]
    Database(#[from] ledgerline_store::DbError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal engine error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if this error indicates a configuration problem.
    ///
    /// Config errors are never worth retrying: the next scheduled run
    /// will fail identically until an operator intervenes.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::MissingCredential
                | SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::RateSource(_)
        )
    }

    /// Returns true for transport/remote failures that a later run can
    /// reasonably retry (no in-run retry is ever attempted: cache misses
    /// persist, so the next scheduled run naturally picks the work up).
    pub fn is_remote_error(&self) -> bool {
        matches!(
            self,
            SyncError::Remote { .. } | SyncError::Http(_) | SyncError::Decode(_)
        )
    }

    /// HTTP status carried by a remote error, if any.
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            SyncError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_categorization() {
        assert!(SyncError::MissingCredential.is_config_error());
        assert!(SyncError::RateSource("bad toml".into()).is_config_error());
        assert!(!SyncError::Remote { status: 500, body: String::new() }.is_config_error());
    }

    #[test]
    fn test_remote_categorization() {
        let err = SyncError::Remote {
            status: 429,
            body: "rate limited".into(),
        };
        assert!(err.is_remote_error());
        assert_eq!(err.remote_status(), Some(429));
        assert!(!SyncError::MissingCredential.is_remote_error());
    }

    #[test]
    fn test_error_display_carries_status_and_body() {
        let err = SyncError::Remote {
            status: 404,
            body: "order not found".into(),
        };
        let text = err.to_string();
        assert!(text.contains("404"));
        assert!(text.contains("order not found"));
    }
}
