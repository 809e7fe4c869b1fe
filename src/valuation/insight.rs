//! Best-effort narrative augmentation. The numeric estimate is computed
//! before this module is consulted, and nothing that happens here can
//! change or withhold it.

use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use super::adjustment::AdjustedComparable;
use super::domain::{LivingArea, UnitSpec};
use super::settings::TenantSettings;
use super::statistics::EstimateResult;

/// Payload handed to the external text-generation capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativeRequest {
    pub subject_summary: String,
    pub estimate_summary: String,
    pub comparable_summaries: Vec<String>,
    pub credential: String,
}

/// Failure from the text-generation capability. Absorbed at this boundary;
/// callers of the estimate entry point never observe these.
#[derive(Debug, thiserror::Error)]
pub enum NarrativeError {
    #[error("credential rejected: {0}")]
    Credential(String),
    #[error("narrative transport failed: {0}")]
    Transport(String),
    #[error("malformed narrative response: {0}")]
    Malformed(String),
}

/// Boundary to the external text-generation service. Implementations may
/// block; the augmenter runs them off the async worker under a timeout.
pub trait NarrativeGateway: Send + Sync {
    fn generate(&self, request: NarrativeRequest) -> Result<String, NarrativeError>;
}

/// Wraps the gateway with tenant gating, request assembly, and a hard time
/// budget.
pub struct InsightAugmenter {
    gateway: Arc<dyn NarrativeGateway>,
    timeout: Duration,
    max_comparables: usize,
}

impl fmt::Debug for InsightAugmenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsightAugmenter")
            .field("timeout", &self.timeout)
            .field("max_comparables", &self.max_comparables)
            .finish_non_exhaustive()
    }
}

impl InsightAugmenter {
    pub fn new(gateway: Arc<dyn NarrativeGateway>, timeout: Duration) -> Self {
        Self {
            gateway,
            timeout,
            max_comparables: 6,
        }
    }

    pub fn with_max_comparables(mut self, max_comparables: usize) -> Self {
        self.max_comparables = max_comparables;
        self
    }

    /// Attempt a narrative for an already-final numeric estimate. Returns
    /// `None` when the tenant has the feature off, no credential is
    /// configured, or generation fails or overruns its budget.
    pub async fn narrate(
        &self,
        subject: &UnitSpec,
        estimate: &EstimateResult,
        comparables: &[AdjustedComparable],
        settings: &TenantSettings,
    ) -> Option<String> {
        let credential = settings.narrative_credential()?;

        let request = NarrativeRequest {
            subject_summary: subject_summary(subject),
            estimate_summary: estimate_summary(estimate),
            comparable_summaries: comparables
                .iter()
                .take(self.max_comparables)
                .map(|comparable| comparable.scored.transaction.short_summary())
                .collect(),
            credential: credential.to_string(),
        };

        let gateway = Arc::clone(&self.gateway);
        let task = tokio::task::spawn_blocking(move || gateway.generate(request));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(text))) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    tracing::warn!("narrative generation returned an empty response");
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Ok(Ok(Err(error))) => {
                tracing::warn!(%error, "narrative generation failed");
                None
            }
            Ok(Err(join_error)) => {
                tracing::warn!(error = %join_error, "narrative task aborted");
                None
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "narrative generation timed out"
                );
                None
            }
        }
    }
}

fn subject_summary(subject: &UnitSpec) -> String {
    let mut summary = String::new();
    let beds = subject
        .bedrooms
        .map(|count| count.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let baths = subject
        .bathrooms
        .map(|count| count.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let area = match subject.living_area {
        LivingArea::Exact(sqft) => format!("{sqft} sqft"),
        LivingArea::Range { lower, upper } => format!("{lower}-{upper} sqft"),
    };

    let _ = write!(
        summary,
        "{} {} with {} bed / {} bath, {}",
        subject.category.label(),
        subject.deal.label(),
        beds,
        baths,
        area
    );
    if subject.parking_spaces > 0 || subject.lockers > 0 {
        let _ = write!(
            summary,
            ", {} parking space(s), {} locker(s)",
            subject.parking_spaces, subject.lockers
        );
    }
    if let Some(community) = subject.geography.community.as_deref() {
        let _ = write!(summary, " in {community}");
    } else if let Some(building) = subject.geography.building.as_deref() {
        let _ = write!(summary, " at {building}");
    }
    summary
}

fn estimate_summary(estimate: &EstimateResult) -> String {
    format!(
        "estimated at {} (range {}-{}), {} confidence from {} comparable(s) at the {} tier",
        estimate.estimated_price,
        estimate.range.low,
        estimate.range.high,
        estimate.confidence.label(),
        estimate.comparables_used,
        estimate.scope.label()
    )
}
