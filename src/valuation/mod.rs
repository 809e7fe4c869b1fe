//! Comparable-based valuation engine: subject normalization, tiered
//! comparable search, attribute-difference price normalization,
//! similarity-weighted statistics with confidence gating, best-effort
//! narrative augmentation, and the independent price-per-square-foot
//! rollup.

pub mod adjustment;
pub mod archive;
pub mod domain;
pub mod insight;
pub mod matching;
pub mod repository;
pub mod rollup;
pub mod router;
pub mod service;
pub mod settings;
pub mod statistics;
pub mod subject;

#[cfg(test)]
mod tests;

pub use adjustment::{normalize_prices, select_for_estimate, AdjustedComparable};
pub use archive::{ArchiveError, TransactionArchive};
pub use domain::{
    ComparableTransaction, DealKind, GeoScope, GeographyRef, ListingStatus, LivingArea,
    PropertyCategory, TenantId, TransactionId, UnitSpec,
};
pub use insight::{InsightAugmenter, NarrativeError, NarrativeGateway, NarrativeRequest};
pub use matching::{
    ComparableMatcher, MatchError, MatchPolicy, MatchResult, ScoredComparable, SearchTier,
    SimilarityWeights, TierMinimums,
};
pub use repository::{StoreError, TransactionQuery, TransactionScan, TransactionStore};
pub use rollup::{
    AggregateSummary, InMemoryRollupStore, PsfStats, RollupEngine, RollupError, RollupRunReport,
    RollupStore,
};
pub use router::{valuation_router, EstimateRequest, MatchRequest};
pub use service::{ValuationError, ValuationService};
pub use settings::{
    AdjustmentSchedule, InMemorySettingsStore, TenantSettings, TenantSettingsStore,
};
pub use statistics::{
    Confidence, EstimateCalculator, EstimatePolicy, EstimateResult, PriceRange, ScopeSpread,
};
pub use subject::{normalize_subject, AreaRangeForm, InvalidSpecError, SubjectForm};
