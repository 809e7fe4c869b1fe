use std::sync::Arc;

use chrono::NaiveDate;

use super::adjustment::{normalize_prices, select_for_estimate};
use super::domain::TenantId;
use super::insight::InsightAugmenter;
use super::matching::{ComparableMatcher, MatchError, MatchPolicy, MatchResult};
use super::repository::{StoreError, TransactionStore};
use super::settings::{TenantSettings, TenantSettingsStore};
use super::statistics::{EstimateCalculator, EstimatePolicy, EstimateResult};
use super::subject::{normalize_subject, InvalidSpecError, SubjectForm};

/// Service composing the full valuation pipeline: subject normalization,
/// tiered matching, price normalization, statistical reduction, and the
/// optional narrative tail.
pub struct ValuationService<S, C> {
    store: Arc<S>,
    settings: Arc<C>,
    match_policy: MatchPolicy,
    estimate_policy: EstimatePolicy,
    augmenter: Option<Arc<InsightAugmenter>>,
}

impl<S, C> ValuationService<S, C>
where
    S: TransactionStore + 'static,
    C: TenantSettingsStore + 'static,
{
    pub fn new(store: Arc<S>, settings: Arc<C>) -> Self {
        Self::with_policies(
            store,
            settings,
            MatchPolicy::default(),
            EstimatePolicy::default(),
        )
    }

    pub fn with_policies(
        store: Arc<S>,
        settings: Arc<C>,
        match_policy: MatchPolicy,
        estimate_policy: EstimatePolicy,
    ) -> Self {
        Self {
            store,
            settings,
            match_policy,
            estimate_policy,
            augmenter: None,
        }
    }

    pub fn with_augmenter(mut self, augmenter: Arc<InsightAugmenter>) -> Self {
        self.augmenter = Some(augmenter);
        self
    }

    /// Diagnostic entry point: run normalization and the tiered search
    /// without pricing.
    pub fn match_comparables(
        &self,
        form: SubjectForm,
        tenant: &TenantId,
        as_of: NaiveDate,
    ) -> Result<MatchResult, ValuationError> {
        let spec = normalize_subject(form)?;
        let matched = ComparableMatcher::new(self.store.as_ref(), &self.match_policy)
            .match_comparables(&spec, as_of)?;

        tracing::debug!(
            tenant = %tenant.0,
            scope = matched.scope.label(),
            samples = matched.sample_count(),
            widened = matched.widened,
            "comparable search finished"
        );
        Ok(matched)
    }

    /// Full valuation. The numeric result is final before the narrative is
    /// attempted; narrative failures are invisible here.
    pub async fn estimate(
        &self,
        form: SubjectForm,
        tenant: &TenantId,
        include_narrative: bool,
        as_of: NaiveDate,
    ) -> Result<EstimateResult, ValuationError> {
        let spec = normalize_subject(form)?;
        let settings = self
            .settings
            .fetch(tenant)?
            .unwrap_or_else(|| TenantSettings::defaults_for(tenant.clone()));

        let matched = ComparableMatcher::new(self.store.as_ref(), &self.match_policy)
            .match_comparables(&spec, as_of)?;

        let adjusted = normalize_prices(
            &spec,
            matched.comparables.clone(),
            &settings.adjustments,
            spec.deal,
        );
        let selected = select_for_estimate(adjusted, self.match_policy.selection_cap);

        let mut estimate = EstimateCalculator::new(&self.estimate_policy)
            .estimate(&matched, &selected);

        tracing::debug!(
            tenant = %tenant.0,
            scope = estimate.scope.label(),
            samples = estimate.sample_count,
            confidence = estimate.confidence.label(),
            show_price = estimate.show_price,
            "estimate computed"
        );

        if include_narrative && estimate.show_price {
            if let Some(augmenter) = &self.augmenter {
                estimate.narrative = augmenter
                    .narrate(&spec, &estimate, &selected, &settings)
                    .await;
            }
        }

        Ok(estimate)
    }
}

/// Error raised by the valuation entry points. Insufficient data is not an
/// error: it arrives as a successful estimate with `show_price == false`.
#[derive(Debug, thiserror::Error)]
pub enum ValuationError {
    #[error(transparent)]
    Subject(#[from] InvalidSpecError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<MatchError> for ValuationError {
    fn from(value: MatchError) -> Self {
        match value {
            MatchError::Store(err) => ValuationError::Store(err),
            MatchError::NoAddressableGeography => {
                ValuationError::Subject(InvalidSpecError::MissingGeography)
            }
        }
    }
}
