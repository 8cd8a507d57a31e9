//! Search error taxonomy.
//!
//! The engine surfaces store failures and deadline overruns as typed errors
//! carrying the query context. Empty or sub-minimum queries are *not* errors:
//! they short-circuit to an empty result set before the store is touched.

use thiserror::Error;

/// Errors a [`crate::search::SearchEngine`] call can surface.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The underlying store failed (connection loss, corrupted schema, ...).
    /// Not retried internally; retry policy belongs to the caller.
    #[error("store unavailable while searching {query:?}: {source}")]
    StoreUnavailable {
        query: String,
        #[source]
        source: sqlx::Error,
    },

    /// The caller-imposed deadline elapsed mid-query. The in-flight store
    /// call is abandoned rather than returning partial results.
    #[error("search {query:?} exceeded deadline of {timeout_ms} ms")]
    Timeout { query: String, timeout_ms: u64 },
}

impl SearchError {
    /// Machine-readable error kind, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            SearchError::StoreUnavailable { .. } => "store_unavailable",
            SearchError::Timeout { .. } => "timeout",
        }
    }
}
