use super::common::{close, condo_form, days_before_as_of};
use crate::valuation::adjustment::{normalize_prices, select_for_estimate};
use crate::valuation::domain::DealKind;
use crate::valuation::matching::ScoredComparable;
use crate::valuation::settings::AdjustmentSchedule;
use crate::valuation::subject::normalize_subject;

fn schedule() -> AdjustmentSchedule {
    AdjustmentSchedule {
        sale_parking_space: 50_000,
        sale_locker: 5_000,
        lease_parking_space: 150,
        lease_locker: 25,
    }
}

fn scored(id: &str, price: u64, similarity: f64) -> ScoredComparable {
    ScoredComparable {
        transaction: close(id, price, days_before_as_of(30)),
        similarity,
    }
}

#[test]
fn extra_parking_on_the_comparable_is_subtracted() {
    let subject = normalize_subject(condo_form()).expect("valid subject");
    let mut comparable = scored("txn-1", 500_000, 0.9);
    comparable.transaction.parking_spaces = 1;

    let adjusted = normalize_prices(&subject, vec![comparable], &schedule(), DealKind::Sale);

    assert_eq!(adjusted[0].adjusted_price, 450_000);
    assert!(!adjusted[0].clamped);
}

#[test]
fn missing_parking_on_the_comparable_is_added_back() {
    let mut form = condo_form();
    form.parking_spaces = Some(2);
    let subject = normalize_subject(form).expect("valid subject");
    let comparable = scored("txn-1", 500_000, 0.9);

    let adjusted = normalize_prices(&subject, vec![comparable], &schedule(), DealKind::Sale);

    assert_eq!(adjusted[0].adjusted_price, 600_000);
}

#[test]
fn locker_values_use_the_deal_direction() {
    let mut form = condo_form();
    form.deal = DealKind::Lease;
    form.lockers = Some(1);
    let subject = normalize_subject(form).expect("valid subject");
    let mut comparable = scored("txn-1", 2_400, 0.9);
    comparable.transaction.deal = DealKind::Lease;

    let adjusted = normalize_prices(&subject, vec![comparable], &schedule(), DealKind::Lease);

    assert_eq!(adjusted[0].adjusted_price, 2_425);
}

#[test]
fn adjustment_never_goes_negative() {
    let subject = normalize_subject(condo_form()).expect("valid subject");
    let mut comparable = scored("txn-1", 30_000, 0.9);
    comparable.transaction.parking_spaces = 2;

    let adjusted = normalize_prices(&subject, vec![comparable], &schedule(), DealKind::Sale);

    assert_eq!(adjusted[0].adjusted_price, 0);
    assert!(adjusted[0].clamped);
}

#[test]
fn clamped_comparables_yield_cap_slots_to_clean_ones() {
    let subject = normalize_subject(condo_form()).expect("valid subject");

    // the clamped comparable ranks first on similarity
    let mut starved = scored("txn-clamped", 20_000, 0.95);
    starved.transaction.parking_spaces = 2;
    let comparables = vec![
        starved,
        scored("txn-a", 600_000, 0.90),
        scored("txn-b", 602_000, 0.85),
    ];

    let adjusted = normalize_prices(&subject, comparables, &schedule(), DealKind::Sale);
    let selected = select_for_estimate(adjusted, 2);

    let ids: Vec<&str> = selected
        .iter()
        .map(|comparable| comparable.scored.transaction.id.0.as_str())
        .collect();
    assert_eq!(ids, vec!["txn-a", "txn-b"]);
}

#[test]
fn clamped_comparables_still_fill_an_underfull_cap() {
    let subject = normalize_subject(condo_form()).expect("valid subject");

    let mut starved = scored("txn-clamped", 20_000, 0.95);
    starved.transaction.parking_spaces = 2;
    let comparables = vec![starved, scored("txn-a", 600_000, 0.90)];

    let adjusted = normalize_prices(&subject, comparables, &schedule(), DealKind::Sale);
    let selected = select_for_estimate(adjusted, 2);

    assert_eq!(selected.len(), 2);
    assert!(selected
        .iter()
        .any(|comparable| comparable.scored.transaction.id.0 == "txn-clamped"));
}
