use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::valuation::domain::{ComparableTransaction, DealKind, LivingArea, UnitSpec};

/// Relative weights of the soft similarity components. Tunable per market;
/// defaults reflect bedrooms and area dominating buyer substitution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityWeights {
    pub bedrooms: f64,
    pub bathrooms: f64,
    pub area: f64,
    pub recency: f64,
    pub annual_tax: f64,
    pub lot_frontage: f64,
    /// Multiplier applied to the lot-frontage weight for lease subjects:
    /// tenants price the structure, not the land under it.
    pub lease_lot_discount: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            bedrooms: 3.0,
            bathrooms: 2.0,
            area: 4.0,
            recency: 2.0,
            annual_tax: 0.5,
            lot_frontage: 1.5,
            lease_lot_discount: 0.25,
        }
    }
}

/// Weighted similarity of a candidate to the subject, in [0, 1].
///
/// Candidates outside the lookback horizon never reach this function; the
/// recency component only grades age inside the window.
pub fn similarity(
    subject: &UnitSpec,
    candidate: &ComparableTransaction,
    as_of: NaiveDate,
    lookback_days: i64,
    weights: &SimilarityWeights,
) -> f64 {
    let lot_weight = match subject.deal {
        DealKind::Lease => weights.lot_frontage * weights.lease_lot_discount,
        DealKind::Sale => weights.lot_frontage,
    };

    let components = [
        (weights.bedrooms, count_affinity(subject.bedrooms, candidate.bedrooms)),
        (
            weights.bathrooms,
            count_affinity(subject.bathrooms, candidate.bathrooms),
        ),
        (
            weights.area,
            area_affinity(&subject.living_area, &candidate.living_area),
        ),
        (
            weights.recency,
            recency_affinity(candidate.close_date, as_of, lookback_days),
        ),
        (
            weights.annual_tax,
            optional_ratio_affinity(subject.annual_tax, candidate.annual_tax),
        ),
        (
            lot_weight,
            optional_ratio_affinity(subject.lot_frontage_ft, candidate.lot_frontage_ft),
        ),
    ];

    let total_weight: f64 = components.iter().map(|(weight, _)| weight).sum();
    if total_weight <= f64::EPSILON {
        return 0.0;
    }

    let weighted: f64 = components
        .iter()
        .map(|(weight, score)| weight * score.clamp(0.0, 1.0))
        .sum();
    weighted / total_weight
}

fn count_affinity(subject: Option<u8>, candidate: Option<u8>) -> f64 {
    match (subject, candidate) {
        (Some(a), Some(b)) => {
            let delta = f64::from(a.abs_diff(b));
            1.0 / (1.0 + delta)
        }
        // unknown on either side is neutral rather than penalizing
        _ => 0.5,
    }
}

fn area_affinity(subject: &LivingArea, candidate: &LivingArea) -> f64 {
    match (subject, candidate) {
        (LivingArea::Exact(a), LivingArea::Exact(b)) => ratio_affinity(f64::from(*a), f64::from(*b)),
        (LivingArea::Exact(sqft), LivingArea::Range { lower, upper })
        | (LivingArea::Range { lower, upper }, LivingArea::Exact(sqft)) => {
            // bucket compatibility grades below an exact-to-exact match
            if sqft >= lower && sqft <= upper {
                0.85
            } else {
                let nearest = if sqft < lower { *lower } else { *upper };
                0.85 * ratio_affinity(f64::from(*sqft), f64::from(nearest))
            }
        }
        (
            LivingArea::Range {
                lower: a_lo,
                upper: a_hi,
            },
            LivingArea::Range {
                lower: b_lo,
                upper: b_hi,
            },
        ) => {
            let overlap = (f64::from((*a_hi).min(*b_hi)) - f64::from((*a_lo).max(*b_lo))).max(0.0);
            let union = f64::from((*a_hi).max(*b_hi)) - f64::from((*a_lo).min(*b_lo));
            if union <= 0.0 {
                // both buckets degenerate to the same point
                return 0.9;
            }
            0.9 * (overlap / union)
        }
    }
}

fn recency_affinity(close_date: NaiveDate, as_of: NaiveDate, lookback_days: i64) -> f64 {
    if lookback_days <= 0 {
        return 0.0;
    }
    let age_days = (as_of - close_date).num_days().max(0);
    (1.0 - age_days as f64 / lookback_days as f64).clamp(0.0, 1.0)
}

fn optional_ratio_affinity<T: Into<f64> + Copy>(subject: Option<T>, candidate: Option<T>) -> f64 {
    match (subject, candidate) {
        (Some(a), Some(b)) => ratio_affinity(a.into(), b.into()),
        _ => 0.5,
    }
}

fn ratio_affinity(a: f64, b: f64) -> f64 {
    if a <= 0.0 && b <= 0.0 {
        return 1.0;
    }
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    if high <= 0.0 {
        return 1.0;
    }
    (low / high).clamp(0.0, 1.0)
}
