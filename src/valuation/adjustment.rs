//! Attribute-difference price normalization: re-expresses each comparable's
//! close price as if the unit had carried the subject's parking and locker
//! counts, so those differences stop biasing the aggregate.

use serde::{Deserialize, Serialize};

use super::domain::{DealKind, UnitSpec};
use super::matching::ScoredComparable;
use super::settings::AdjustmentSchedule;

/// A scored comparable with its normalized price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedComparable {
    #[serde(flatten)]
    pub scored: ScoredComparable,
    pub adjusted_price: u64,
    /// Set when the adjustment drove the price to the zero clamp; such a
    /// comparable is kept but treated as low quality.
    pub clamped: bool,
}

/// Normalize every comparable's close price against the subject using the
/// tenant's direction-specific per-unit values. Ranking order is preserved.
pub fn normalize_prices(
    subject: &UnitSpec,
    comparables: Vec<ScoredComparable>,
    schedule: &AdjustmentSchedule,
    deal: DealKind,
) -> Vec<AdjustedComparable> {
    comparables
        .into_iter()
        .map(|scored| {
            let parking_delta = i64::from(subject.parking_spaces)
                - i64::from(scored.transaction.parking_spaces);
            let locker_delta =
                i64::from(subject.lockers) - i64::from(scored.transaction.lockers);

            let adjustment = parking_delta * schedule.parking_value(deal) as i64
                + locker_delta * schedule.locker_value(deal) as i64;
            let raw = scored.transaction.close_price as i64 + adjustment;

            let clamped = raw < 0;
            AdjustedComparable {
                scored,
                adjusted_price: raw.max(0) as u64,
                clamped,
            }
        })
        .collect()
}

/// Take up to `cap` comparables for the statistical step. Unclamped
/// comparables take the cap slots first, in their existing similarity
/// order; clamped ones fill remaining slots only when nothing better is
/// left.
pub fn select_for_estimate(
    adjusted: Vec<AdjustedComparable>,
    cap: usize,
) -> Vec<AdjustedComparable> {
    if adjusted.len() <= cap {
        return adjusted;
    }

    let (clean, clamped): (Vec<_>, Vec<_>) =
        adjusted.into_iter().partition(|comparable| !comparable.clamped);

    let mut selected = clean;
    selected.truncate(cap);
    if selected.len() < cap {
        let remaining = cap - selected.len();
        selected.extend(clamped.into_iter().take(remaining));
    }
    selected
}
