use chrono::NaiveDate;

use super::domain::{ComparableTransaction, DealKind, GeoScope, PropertyCategory, TransactionId};

/// Hard-filter parameters for one tier of the comparable search. The store
/// applies these; soft similarity ranking stays in the matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionQuery<'a> {
    pub deal: DealKind,
    pub category: PropertyCategory,
    pub scope: GeoScope,
    pub scope_key: &'a str,
    pub exclude: Option<&'a TransactionId>,
    /// Closes strictly before this date fall outside the lookback horizon
    /// and must not be returned.
    pub closed_on_or_after: NaiveDate,
}

/// Query capability over the historical closed-transaction population,
/// supplied by the ingestion/storage collaborator. Implementations return
/// closed records only; order is irrelevant.
pub trait TransactionStore: Send + Sync {
    fn closed_transactions(
        &self,
        query: &TransactionQuery<'_>,
    ) -> Result<Vec<ComparableTransaction>, StoreError>;
}

/// Full-population read used by the aggregate rollup. Kept separate from
/// [`TransactionStore`] so request-path implementations are not forced to
/// support whole-archive scans.
pub trait TransactionScan: Send + Sync {
    fn all_closed(&self) -> Result<Vec<ComparableTransaction>, StoreError>;
}

/// Failure talking to an external store. Surfaced to the caller as-is —
/// a fault is never folded into an empty result set.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(String),
}
