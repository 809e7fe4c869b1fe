//! Statistical reduction of an adjusted comparable set: similarity-weighted
//! central tendency, tier- and sample-dependent range, confidence
//! classification, and the display gate for sparse data.

use serde::{Deserialize, Serialize};

use super::adjustment::AdjustedComparable;
use super::domain::GeoScope;
use super::matching::MatchResult;

/// Coarse trustworthiness classification of an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub const fn label(self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

/// Inclusive price band around the point estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub low: u64,
    pub high: u64,
}

/// Final valuation output. When `show_price` is false the numeric fields
/// are populated but not meant for display; the scope/sample metadata is
/// what the caller should surface instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateResult {
    pub estimated_price: u64,
    pub range: PriceRange,
    pub confidence: Confidence,
    pub show_price: bool,
    pub scope: GeoScope,
    pub scope_key: String,
    pub sample_count: usize,
    pub min_samples: usize,
    pub comparables_used: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

/// Relative half-width of the price band per scope, before the sample
/// factor. Broader geography means a looser statistical population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScopeSpread {
    pub building: f64,
    pub community: f64,
    pub municipality: f64,
    pub region: f64,
}

impl ScopeSpread {
    pub const fn for_scope(&self, scope: GeoScope) -> f64 {
        match scope {
            GeoScope::Building => self.building,
            GeoScope::Community => self.community,
            GeoScope::Municipality => self.municipality,
            GeoScope::Region => self.region,
        }
    }
}

impl Default for ScopeSpread {
    fn default() -> Self {
        Self {
            building: 0.04,
            community: 0.05,
            municipality: 0.08,
            region: 0.12,
        }
    }
}

/// Tunable parameters of the statistical step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatePolicy {
    pub scope_spread: ScopeSpread,
    /// Clamp band for the `sqrt(min/sample)` range factor.
    pub sample_factor_floor: f64,
    pub sample_factor_ceiling: f64,
    /// High confidence requires the narrowest tier to clear its minimum by
    /// this many samples; at or inside the band the result is marginal.
    pub high_confidence_margin: usize,
    /// Below this many comparables a low-confidence result is unpriced.
    pub absolute_floor: usize,
    /// Currency figures are rounded half-up to a multiple of this unit.
    pub rounding_unit: u64,
}

impl Default for EstimatePolicy {
    fn default() -> Self {
        Self {
            scope_spread: ScopeSpread::default(),
            sample_factor_floor: 0.6,
            sample_factor_ceiling: 1.8,
            high_confidence_margin: 2,
            absolute_floor: 3,
            rounding_unit: 100,
        }
    }
}

/// Reduces a match result plus its adjusted comparables to an estimate.
pub struct EstimateCalculator<'a> {
    policy: &'a EstimatePolicy,
}

impl<'a> EstimateCalculator<'a> {
    pub fn new(policy: &'a EstimatePolicy) -> Self {
        Self { policy }
    }

    pub fn estimate(
        &self,
        matched: &MatchResult,
        selected: &[AdjustedComparable],
    ) -> EstimateResult {
        let central = weighted_median(
            selected
                .iter()
                .map(|comparable| (comparable.adjusted_price, comparable.scored.similarity))
                .collect(),
        );

        let sample_count = matched.sample_count();
        let ratio = self.spread_ratio(matched.scope, sample_count, matched.min_samples);

        let unit = self.policy.rounding_unit.max(1);
        let estimated_price = round_half_up_to_unit(central, unit);
        let range = PriceRange {
            low: round_half_up_to_unit(central * (1.0 - ratio), unit),
            high: round_half_up_to_unit(central * (1.0 + ratio), unit),
        };

        let confidence = self.classify(matched);
        let show_price =
            !(confidence == Confidence::Low && sample_count < self.policy.absolute_floor);

        EstimateResult {
            estimated_price,
            range,
            confidence,
            show_price,
            scope: matched.scope,
            scope_key: matched.scope_key.clone(),
            sample_count,
            min_samples: matched.min_samples,
            comparables_used: selected.len(),
            narrative: None,
        }
    }

    fn spread_ratio(&self, scope: GeoScope, sample_count: usize, min_samples: usize) -> f64 {
        let base = self.policy.scope_spread.for_scope(scope);
        let factor = if sample_count == 0 {
            self.policy.sample_factor_ceiling
        } else {
            (min_samples.max(1) as f64 / sample_count as f64)
                .sqrt()
                .clamp(
                    self.policy.sample_factor_floor,
                    self.policy.sample_factor_ceiling,
                )
        };
        // ratios are quantized to basis points with banker's rounding;
        // currency rounding stays half-up
        quantize_half_even(base * factor, 10_000.0)
    }

    fn classify(&self, matched: &MatchResult) -> Confidence {
        if !matched.is_sufficient() {
            return Confidence::Low;
        }
        let comfortable =
            matched.sample_count() >= matched.min_samples + self.policy.high_confidence_margin;
        if !matched.widened && comfortable {
            Confidence::High
        } else {
            Confidence::Medium
        }
    }
}

/// Weighted median of (price, weight) pairs. Zero total weight degrades to
/// the unweighted median; the exact-half boundary averages the straddling
/// prices.
fn weighted_median(mut entries: Vec<(u64, f64)>) -> f64 {
    if entries.is_empty() {
        return 0.0;
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let total: f64 = entries.iter().map(|(_, weight)| weight.max(0.0)).sum();
    if total <= f64::EPSILON {
        let count = entries.len();
        if count % 2 == 1 {
            return entries[count / 2].0 as f64;
        }
        return (entries[count / 2 - 1].0 as f64 + entries[count / 2].0 as f64) / 2.0;
    }

    let half = total / 2.0;
    let mut accumulated = 0.0;
    for (index, (price, weight)) in entries.iter().enumerate() {
        accumulated += weight.max(0.0);
        if (accumulated - half).abs() <= 1e-9 {
            return match entries.get(index + 1) {
                Some((next, _)) => (*price as f64 + *next as f64) / 2.0,
                None => *price as f64,
            };
        }
        if accumulated > half {
            return *price as f64;
        }
    }
    entries
        .last()
        .map(|(price, _)| *price as f64)
        .unwrap_or(0.0)
}

/// Round-half-up to a multiple of `unit`, for non-negative currency values.
fn round_half_up_to_unit(value: f64, unit: u64) -> u64 {
    let unit_f = unit as f64;
    let scaled = (value.max(0.0) / unit_f + 0.5).floor();
    (scaled * unit_f) as u64
}

/// Quantize a ratio at the given scale using round-half-to-even.
fn quantize_half_even(ratio: f64, scale: f64) -> f64 {
    let scaled = ratio * scale;
    let floor = scaled.floor();
    let fraction = scaled - floor;
    let rounded = if (fraction - 0.5).abs() < 1e-9 {
        if (floor as i64) % 2 == 0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        scaled.round()
    };
    rounded / scale
}
