use super::common::{
    archive_of, as_of, close, condo_form, days_before_as_of, match_policy,
};
use crate::valuation::domain::{
    ComparableTransaction, DealKind, GeoScope, PropertyCategory, TransactionId,
};
use crate::valuation::matching::{
    ladder_for, similarity, ComparableMatcher, MatchError, SimilarityWeights,
};
use crate::valuation::repository::{StoreError, TransactionQuery, TransactionStore};
use crate::valuation::subject::normalize_subject;

struct FailingStore;

impl TransactionStore for FailingStore {
    fn closed_transactions(
        &self,
        _query: &TransactionQuery<'_>,
    ) -> Result<Vec<ComparableTransaction>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

#[test]
fn community_tier_with_adequate_sample_stops_there() {
    let records = (0..6)
        .map(|index| {
            close(
                &format!("txn-{index}"),
                600_000 + index * 1_000,
                days_before_as_of(30 + index as i64),
            )
        })
        .collect();
    let archive = archive_of(records);
    let policy = match_policy();
    let subject = normalize_subject(condo_form()).expect("valid subject");

    let matched = ComparableMatcher::new(&archive, &policy)
        .match_comparables(&subject, as_of())
        .expect("match succeeds");

    assert_eq!(matched.scope, GeoScope::Community);
    assert_eq!(matched.scope_key, "C1");
    assert!(!matched.widened);
    assert_eq!(matched.sample_count(), 6);
    assert!(matched.is_sufficient());
}

#[test]
fn ranks_by_similarity_with_recent_closes_ahead() {
    let mut far_match = close("txn-far", 610_000, days_before_as_of(20));
    far_match.bedrooms = Some(3);
    let older_twin = close("txn-old", 600_000, days_before_as_of(200));
    let newer_twin = close("txn-new", 605_000, days_before_as_of(10));

    // drop the thresholds so a three-row population is a valid stop
    let mut policy = match_policy();
    policy.tier_minimums.community = 1;

    let archive = archive_of(vec![far_match, older_twin, newer_twin]);
    let subject = normalize_subject(condo_form()).expect("valid subject");

    let matched = ComparableMatcher::new(&archive, &policy)
        .match_comparables(&subject, as_of())
        .expect("match succeeds");

    let order: Vec<&str> = matched
        .comparables
        .iter()
        .map(|comparable| comparable.transaction.id.0.as_str())
        .collect();
    assert_eq!(order, vec!["txn-new", "txn-old", "txn-far"]);
}

#[test]
fn widens_to_municipality_when_community_is_short() {
    let mut outside = close("txn-m1", 590_000, days_before_as_of(40));
    outside.geography.community = Some("C2".to_string());

    let mut policy = match_policy();
    policy.tier_minimums.municipality = 3;

    let archive = archive_of(vec![
        close("txn-a", 600_000, days_before_as_of(10)),
        close("txn-b", 602_000, days_before_as_of(15)),
        outside,
    ]);
    let subject = normalize_subject(condo_form()).expect("valid subject");

    let matched = ComparableMatcher::new(&archive, &policy)
        .match_comparables(&subject, as_of())
        .expect("match succeeds");

    assert_eq!(matched.scope, GeoScope::Municipality);
    assert!(matched.widened);
    assert_eq!(matched.sample_count(), 3);
}

#[test]
fn exhausted_ladder_returns_broadest_tier_as_is() {
    let archive = archive_of(vec![close("txn-only", 600_000, days_before_as_of(10))]);
    let policy = match_policy();
    let subject = normalize_subject(condo_form()).expect("valid subject");

    let matched = ComparableMatcher::new(&archive, &policy)
        .match_comparables(&subject, as_of())
        .expect("match succeeds");

    assert_eq!(matched.scope, GeoScope::Region);
    assert!(matched.widened);
    assert!(!matched.is_sufficient());
    assert_eq!(matched.sample_count(), 1);
}

#[test]
fn excluded_listing_never_appears() {
    let mut policy = match_policy();
    policy.tier_minimums.community = 1;

    let archive = archive_of(vec![
        close("txn-self", 600_000, days_before_as_of(5)),
        close("txn-other", 598_000, days_before_as_of(12)),
    ]);
    let mut form = condo_form();
    form.exclude_listing = Some("txn-self".to_string());
    let subject = normalize_subject(form).expect("valid subject");

    let matched = ComparableMatcher::new(&archive, &policy)
        .match_comparables(&subject, as_of())
        .expect("match succeeds");

    assert!(matched
        .comparables
        .iter()
        .all(|comparable| comparable.transaction.id != TransactionId("txn-self".to_string())));
}

#[test]
fn repeat_closes_of_one_unit_collapse_to_most_recent() {
    let mut first = close("txn-1", 580_000, days_before_as_of(300));
    first.unit_key = Some("unit-77".to_string());
    let mut second = close("txn-2", 610_000, days_before_as_of(30));
    second.unit_key = Some("unit-77".to_string());

    let mut policy = match_policy();
    policy.tier_minimums.community = 1;

    let archive = archive_of(vec![first, second]);
    let subject = normalize_subject(condo_form()).expect("valid subject");

    let matched = ComparableMatcher::new(&archive, &policy)
        .match_comparables(&subject, as_of())
        .expect("match succeeds");

    assert_eq!(matched.sample_count(), 1);
    assert_eq!(matched.comparables[0].transaction.id.0, "txn-2");
}

#[test]
fn repeat_closes_survive_when_explicitly_requested() {
    let mut first = close("txn-1", 580_000, days_before_as_of(300));
    first.unit_key = Some("unit-77".to_string());
    let mut second = close("txn-2", 610_000, days_before_as_of(30));
    second.unit_key = Some("unit-77".to_string());

    let mut policy = match_policy();
    policy.tier_minimums.community = 1;
    policy.allow_repeat_sales = true;

    let archive = archive_of(vec![first, second]);
    let subject = normalize_subject(condo_form()).expect("valid subject");

    let matched = ComparableMatcher::new(&archive, &policy)
        .match_comparables(&subject, as_of())
        .expect("match succeeds");

    assert_eq!(matched.sample_count(), 2);
}

#[test]
fn closes_past_the_lookback_horizon_are_dropped() {
    let mut policy = match_policy();
    policy.tier_minimums.community = 1;
    policy.lookback_days = 180;

    let archive = archive_of(vec![
        close("txn-recent", 600_000, days_before_as_of(90)),
        close("txn-stale", 540_000, days_before_as_of(400)),
    ]);
    let subject = normalize_subject(condo_form()).expect("valid subject");

    let matched = ComparableMatcher::new(&archive, &policy)
        .match_comparables(&subject, as_of())
        .expect("match succeeds");

    assert_eq!(matched.sample_count(), 1);
    assert_eq!(matched.comparables[0].transaction.id.0, "txn-recent");
}

#[test]
fn store_fault_is_surfaced_not_swallowed() {
    let policy = match_policy();
    let subject = normalize_subject(condo_form()).expect("valid subject");

    let result = ComparableMatcher::new(&FailingStore, &policy)
        .match_comparables(&subject, as_of());

    assert!(matches!(result, Err(MatchError::Store(_))));
}

#[test]
fn lease_scoring_forgives_a_lot_frontage_mismatch_more_than_sale() {
    let weights = SimilarityWeights::default();

    let mut form = condo_form();
    form.category = PropertyCategory::Detached;
    form.lot_frontage_ft = Some(20);
    let sale_subject = normalize_subject(form).expect("valid subject");
    let mut lease_subject = sale_subject.clone();
    lease_subject.deal = DealKind::Lease;

    let mut candidate = close("txn-wide-lot", 600_000, days_before_as_of(30));
    candidate.category = PropertyCategory::Detached;
    candidate.lot_frontage_ft = Some(60);

    let sale_score = similarity(&sale_subject, &candidate, as_of(), 365, &weights);
    let lease_score = similarity(&lease_subject, &candidate, as_of(), 365, &weights);

    assert!(lease_score > sale_score);
}

#[test]
fn condo_ladder_leads_with_building_when_identified() {
    let mut form = condo_form();
    form.building = Some("BLD-88".to_string());
    let subject = normalize_subject(form).expect("valid subject");

    let ladder = ladder_for(&subject, &match_policy().tier_minimums);
    let scopes: Vec<GeoScope> = ladder.iter().map(|tier| tier.scope).collect();
    assert_eq!(
        scopes,
        vec![GeoScope::Building, GeoScope::Municipality, GeoScope::Region]
    );
}

#[test]
fn home_ladder_leads_with_community_even_at_a_known_address() {
    let mut form = condo_form();
    form.category = PropertyCategory::Detached;
    form.building = Some("12-ELM".to_string());
    let subject = normalize_subject(form).expect("valid subject");

    let ladder = ladder_for(&subject, &match_policy().tier_minimums);
    let scopes: Vec<GeoScope> = ladder.iter().map(|tier| tier.scope).collect();
    assert_eq!(
        scopes,
        vec![
            GeoScope::Community,
            GeoScope::Municipality,
            GeoScope::Region
        ]
    );
}

#[test]
fn ladder_skips_levels_the_subject_cannot_address() {
    let mut form = condo_form();
    form.municipality = None;
    let subject = normalize_subject(form).expect("valid subject");

    let ladder = ladder_for(&subject, &match_policy().tier_minimums);
    let scopes: Vec<GeoScope> = ladder.iter().map(|tier| tier.scope).collect();
    assert_eq!(scopes, vec![GeoScope::Community, GeoScope::Region]);
}
