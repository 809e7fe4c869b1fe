//! Per-geography price-per-square-foot rollup. Runs as a batch job over the
//! full closed-transaction population, independently of the request path,
//! and replaces its snapshot wholesale on every run.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{ComparableTransaction, DealKind, GeoScope};
use super::repository::{StoreError, TransactionScan};

/// Price-per-square-foot statistics for one deal direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsfStats {
    pub average_psf: f64,
    pub median_psf: f64,
    pub sample_count: usize,
    pub earliest_close: NaiveDate,
    pub latest_close: NaiveDate,
}

/// Rollup snapshot entry for one geography key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub scope: GeoScope,
    pub scope_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale: Option<PsfStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease: Option<PsfStats>,
}

/// Snapshot store the rollup writes to and disclosure consumers read from.
/// Consumers treat the snapshot as eventually consistent.
pub trait RollupStore: Send + Sync {
    fn replace_all(&self, summaries: Vec<AggregateSummary>) -> Result<(), StoreError>;
    fn latest(&self, scope: GeoScope, key: &str) -> Result<Option<AggregateSummary>, StoreError>;
}

/// Map-backed snapshot store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRollupStore {
    snapshot: Arc<RwLock<HashMap<(GeoScope, String), AggregateSummary>>>,
}

impl RollupStore for InMemoryRollupStore {
    fn replace_all(&self, summaries: Vec<AggregateSummary>) -> Result<(), StoreError> {
        let mut next = HashMap::with_capacity(summaries.len());
        for summary in summaries {
            next.insert((summary.scope, summary.scope_key.clone()), summary);
        }
        let mut guard = self
            .snapshot
            .write()
            .map_err(|_| StoreError::Unavailable("rollup snapshot lock poisoned".to_string()))?;
        *guard = next;
        Ok(())
    }

    fn latest(&self, scope: GeoScope, key: &str) -> Result<Option<AggregateSummary>, StoreError> {
        let guard = self
            .snapshot
            .read()
            .map_err(|_| StoreError::Unavailable("rollup snapshot lock poisoned".to_string()))?;
        Ok(guard.get(&(scope, key.to_string())).cloned())
    }
}

/// Rollup failure. `AlreadyRunning` enforces at-most-one full scan in
/// flight per engine.
#[derive(Debug, thiserror::Error)]
pub enum RollupError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("a rollup run is already in flight")]
    AlreadyRunning,
}

/// Outcome of one rollup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RollupRunReport {
    pub scanned: usize,
    pub summaries: usize,
}

/// Full-recompute rollup over a scannable transaction population.
pub struct RollupEngine<S, R> {
    scan: Arc<S>,
    sink: Arc<R>,
    in_flight: AtomicBool,
}

impl<S, R> RollupEngine<S, R>
where
    S: TransactionScan,
    R: RollupStore,
{
    pub fn new(scan: Arc<S>, sink: Arc<R>) -> Self {
        Self {
            scan,
            sink,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Recompute every geography's summary from scratch and swap the
    /// snapshot. Identical input data always converges to an identical
    /// snapshot.
    pub fn run(&self) -> Result<RollupRunReport, RollupError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Err(RollupError::AlreadyRunning);
        }
        let result = self.run_inner();
        self.in_flight.store(false, Ordering::Release);
        result
    }

    fn run_inner(&self) -> Result<RollupRunReport, RollupError> {
        let rows = self.scan.all_closed()?;

        let mut groups: BTreeMap<(GeoScope, String), Vec<&ComparableTransaction>> = BTreeMap::new();
        for txn in &rows {
            for scope in [
                GeoScope::Building,
                GeoScope::Community,
                GeoScope::Municipality,
                GeoScope::Region,
            ] {
                if let Some(key) = txn.geography.key_for(scope) {
                    groups
                        .entry((scope, key.to_string()))
                        .or_default()
                        .push(txn);
                }
            }
        }

        let summaries: Vec<AggregateSummary> = groups
            .into_iter()
            .map(|((scope, scope_key), members)| AggregateSummary {
                scope,
                scope_key,
                sale: psf_stats(&members, DealKind::Sale),
                lease: psf_stats(&members, DealKind::Lease),
            })
            .collect();

        let report = RollupRunReport {
            scanned: rows.len(),
            summaries: summaries.len(),
        };
        self.sink.replace_all(summaries)?;
        Ok(report)
    }
}

/// Stats for one deal direction within a geography group. Only exact-area
/// transactions contribute; a bucketed range has no trustworthy
/// denominator.
fn psf_stats(members: &[&ComparableTransaction], deal: DealKind) -> Option<PsfStats> {
    let mut psf_values = Vec::new();
    let mut earliest: Option<NaiveDate> = None;
    let mut latest: Option<NaiveDate> = None;

    for txn in members.iter().filter(|txn| txn.deal == deal) {
        let Some(sqft) = txn.living_area.exact().filter(|sqft| *sqft > 0) else {
            continue;
        };
        psf_values.push(txn.close_price as f64 / f64::from(sqft));
        earliest = Some(earliest.map_or(txn.close_date, |date| date.min(txn.close_date)));
        latest = Some(latest.map_or(txn.close_date, |date| date.max(txn.close_date)));
    }

    if psf_values.is_empty() {
        return None;
    }

    let sample_count = psf_values.len();
    let average = psf_values.iter().sum::<f64>() / sample_count as f64;

    psf_values.sort_by(f64::total_cmp);
    let median = if sample_count % 2 == 1 {
        psf_values[sample_count / 2]
    } else {
        (psf_values[sample_count / 2 - 1] + psf_values[sample_count / 2]) / 2.0
    };

    Some(PsfStats {
        average_psf: round_cents(average),
        median_psf: round_cents(median),
        sample_count,
        earliest_close: earliest?,
        latest_close: latest?,
    })
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
