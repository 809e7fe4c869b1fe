//! Tiered comparable search: hard filters through the transaction store,
//! soft similarity ranking, and geographic widening until a tier carries an
//! adequate sample.

mod scoring;
mod tiers;

pub use scoring::{similarity, SimilarityWeights};
pub use tiers::{ladder_for, SearchTier, TierMinimums};

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::domain::{ComparableTransaction, GeoScope, UnitSpec};
use super::repository::{StoreError, TransactionQuery, TransactionStore};

/// Tunable parameters of the comparable search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPolicy {
    pub tier_minimums: TierMinimums,
    /// Upper bound on comparables handed to the statistical calculator.
    pub selection_cap: usize,
    /// Closes older than this are dropped outright, never down-weighted.
    pub lookback_days: i64,
    /// Allow the same physical unit to contribute more than one close
    /// inside the lookback window.
    pub allow_repeat_sales: bool,
    pub weights: SimilarityWeights,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            tier_minimums: TierMinimums::default(),
            selection_cap: 10,
            lookback_days: 365,
            allow_repeat_sales: false,
            weights: SimilarityWeights::default(),
        }
    }
}

/// A candidate comparable with its similarity to the subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredComparable {
    pub transaction: ComparableTransaction,
    pub similarity: f64,
}

/// Outcome of the tiered search: every qualifying candidate at the tier the
/// search stopped on, ranked most-similar first (ties to the most recent
/// close). The selection cap is applied downstream, after price
/// normalization, so low-quality adjustments can be demoted first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub scope: GeoScope,
    pub scope_key: String,
    pub min_samples: usize,
    /// True when the search left the narrowest addressable tier.
    pub widened: bool,
    pub comparables: Vec<ScoredComparable>,
}

impl MatchResult {
    pub fn sample_count(&self) -> usize {
        self.comparables.len()
    }

    pub fn is_sufficient(&self) -> bool {
        self.sample_count() >= self.min_samples
    }
}

/// Failure of the comparable search.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("subject has no addressable geography")]
    NoAddressableGeography,
}

/// Search engine over a transaction store and a tuning policy.
pub struct ComparableMatcher<'a, S> {
    store: &'a S,
    policy: &'a MatchPolicy,
}

impl<'a, S> ComparableMatcher<'a, S>
where
    S: TransactionStore,
{
    pub fn new(store: &'a S, policy: &'a MatchPolicy) -> Self {
        Self { store, policy }
    }

    /// Walk the tier ladder narrowest-first and return the first tier with
    /// an adequate sample; when no tier reaches its minimum, the broadest
    /// addressable tier is returned as-is and the statistical calculator
    /// decides whether it is usable.
    pub fn match_comparables(
        &self,
        subject: &UnitSpec,
        as_of: NaiveDate,
    ) -> Result<MatchResult, MatchError> {
        let ladder = ladder_for(subject, &self.policy.tier_minimums);
        let cutoff = as_of - Duration::days(self.policy.lookback_days);

        let mut fallback: Option<MatchResult> = None;
        for (position, tier) in ladder.iter().enumerate() {
            let Some(scope_key) = subject.geography.key_for(tier.scope) else {
                continue;
            };

            let query = TransactionQuery {
                deal: subject.deal,
                category: subject.category,
                scope: tier.scope,
                scope_key,
                exclude: subject.exclude_listing.as_ref(),
                closed_on_or_after: cutoff,
            };
            let rows = self.store.closed_transactions(&query)?;

            let candidates = if self.policy.allow_repeat_sales {
                rows
            } else {
                dedupe_repeat_closes(rows)
            };

            let mut comparables: Vec<ScoredComparable> = candidates
                .into_iter()
                .map(|transaction| ScoredComparable {
                    similarity: similarity(
                        subject,
                        &transaction,
                        as_of,
                        self.policy.lookback_days,
                        &self.policy.weights,
                    ),
                    transaction,
                })
                .collect();
            comparables.sort_by(|a, b| {
                b.similarity
                    .total_cmp(&a.similarity)
                    .then_with(|| b.transaction.close_date.cmp(&a.transaction.close_date))
            });

            let result = MatchResult {
                scope: tier.scope,
                scope_key: scope_key.to_string(),
                min_samples: tier.min_samples,
                widened: position > 0,
                comparables,
            };

            if result.is_sufficient() {
                return Ok(result);
            }
            fallback = Some(result);
        }

        fallback.ok_or(MatchError::NoAddressableGeography)
    }
}

/// Keep only the most recent close per physical unit. Records without a
/// unit key cannot be correlated and pass through untouched.
fn dedupe_repeat_closes(mut rows: Vec<ComparableTransaction>) -> Vec<ComparableTransaction> {
    rows.sort_by(|a, b| b.close_date.cmp(&a.close_date));
    let mut seen = HashSet::new();
    rows.retain(|txn| match &txn.unit_key {
        Some(key) => seen.insert(key.clone()),
        None => true,
    });
    rows
}
