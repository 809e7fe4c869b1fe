use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::common::{close, condo_form, days_before_as_of};
use crate::valuation::adjustment::AdjustedComparable;
use crate::valuation::domain::{GeoScope, TenantId};
use crate::valuation::insight::{
    InsightAugmenter, NarrativeError, NarrativeGateway, NarrativeRequest,
};
use crate::valuation::matching::ScoredComparable;
use crate::valuation::settings::TenantSettings;
use crate::valuation::statistics::{Confidence, EstimateResult, PriceRange};
use crate::valuation::subject::normalize_subject;

enum Behavior {
    Succeed,
    RejectCredential,
    Stall(Duration),
}

struct ScriptedGateway {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl ScriptedGateway {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl NarrativeGateway for ScriptedGateway {
    fn generate(&self, request: NarrativeRequest) -> Result<String, NarrativeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Succeed => Ok(format!(
                "Based on {} recent closes: {}.",
                request.comparable_summaries.len(),
                request.estimate_summary
            )),
            Behavior::RejectCredential => {
                Err(NarrativeError::Credential("key rejected".to_string()))
            }
            Behavior::Stall(delay) => {
                std::thread::sleep(*delay);
                Ok("too late".to_string())
            }
        }
    }
}

fn settings(enabled: bool, credential: Option<&str>) -> TenantSettings {
    TenantSettings {
        narrative_enabled: enabled,
        narrative_credential: credential.map(str::to_string),
        ..TenantSettings::defaults_for(TenantId("acme".to_string()))
    }
}

fn estimate_fixture() -> EstimateResult {
    EstimateResult {
        estimated_price: 612_000,
        range: PriceRange {
            low: 590_000,
            high: 634_000,
        },
        confidence: Confidence::High,
        show_price: true,
        scope: GeoScope::Community,
        scope_key: "C1".to_string(),
        sample_count: 8,
        min_samples: 5,
        comparables_used: 8,
        narrative: None,
    }
}

fn comparables_fixture() -> Vec<AdjustedComparable> {
    (0..3)
        .map(|index| AdjustedComparable {
            scored: ScoredComparable {
                transaction: close(
                    &format!("txn-{index}"),
                    600_000 + index * 2_000,
                    days_before_as_of(20 + index as i64),
                ),
                similarity: 0.9,
            },
            adjusted_price: 600_000 + index * 2_000,
            clamped: false,
        })
        .collect()
}

#[tokio::test]
async fn narrates_when_tenant_is_enabled_with_a_credential() {
    let gateway = ScriptedGateway::new(Behavior::Succeed);
    let augmenter = InsightAugmenter::new(gateway.clone(), Duration::from_millis(500));
    let subject = normalize_subject(condo_form()).expect("valid subject");

    let narrative = augmenter
        .narrate(
            &subject,
            &estimate_fixture(),
            &comparables_fixture(),
            &settings(true, Some("good-key")),
        )
        .await;

    let narrative = narrative.expect("narrative present");
    assert!(narrative.contains("3 recent closes"));
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test]
async fn disabled_tenant_never_reaches_the_gateway() {
    let gateway = ScriptedGateway::new(Behavior::Succeed);
    let augmenter = InsightAugmenter::new(gateway.clone(), Duration::from_millis(500));
    let subject = normalize_subject(condo_form()).expect("valid subject");

    let narrative = augmenter
        .narrate(
            &subject,
            &estimate_fixture(),
            &comparables_fixture(),
            &settings(false, Some("good-key")),
        )
        .await;

    assert!(narrative.is_none());
    assert_eq!(gateway.calls(), 0);
}

#[tokio::test]
async fn missing_credential_never_reaches_the_gateway() {
    let gateway = ScriptedGateway::new(Behavior::Succeed);
    let augmenter = InsightAugmenter::new(gateway.clone(), Duration::from_millis(500));
    let subject = normalize_subject(condo_form()).expect("valid subject");

    let narrative = augmenter
        .narrate(
            &subject,
            &estimate_fixture(),
            &comparables_fixture(),
            &settings(true, None),
        )
        .await;

    assert!(narrative.is_none());
    assert_eq!(gateway.calls(), 0);
}

#[tokio::test]
async fn rejected_credential_is_absorbed() {
    let gateway = ScriptedGateway::new(Behavior::RejectCredential);
    let augmenter = InsightAugmenter::new(gateway.clone(), Duration::from_millis(500));
    let subject = normalize_subject(condo_form()).expect("valid subject");

    let narrative = augmenter
        .narrate(
            &subject,
            &estimate_fixture(),
            &comparables_fixture(),
            &settings(true, Some("bad-key")),
        )
        .await;

    assert!(narrative.is_none());
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test]
async fn overrunning_the_budget_yields_no_narrative() {
    let gateway = ScriptedGateway::new(Behavior::Stall(Duration::from_millis(250)));
    let augmenter = InsightAugmenter::new(gateway.clone(), Duration::from_millis(25));
    let subject = normalize_subject(condo_form()).expect("valid subject");

    let narrative = augmenter
        .narrate(
            &subject,
            &estimate_fixture(),
            &comparables_fixture(),
            &settings(true, Some("good-key")),
        )
        .await;

    assert!(narrative.is_none());
}

#[tokio::test]
async fn comparable_summaries_are_capped() {
    let gateway = ScriptedGateway::new(Behavior::Succeed);
    let augmenter =
        InsightAugmenter::new(gateway.clone(), Duration::from_millis(500)).with_max_comparables(2);
    let subject = normalize_subject(condo_form()).expect("valid subject");

    let narrative = augmenter
        .narrate(
            &subject,
            &estimate_fixture(),
            &comparables_fixture(),
            &settings(true, Some("good-key")),
        )
        .await;

    assert!(narrative.expect("narrative present").contains("2 recent closes"));
}
