use chrono::NaiveDate;

use crate::valuation::archive::TransactionArchive;
use crate::valuation::domain::{
    ComparableTransaction, DealKind, GeographyRef, ListingStatus, LivingArea, PropertyCategory,
    TransactionId,
};
use crate::valuation::matching::{MatchPolicy, SimilarityWeights, TierMinimums};
use crate::valuation::statistics::EstimatePolicy;
use crate::valuation::subject::{AreaRangeForm, SubjectForm};

pub(super) fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 30).expect("valid date")
}

pub(super) fn days_before_as_of(days: i64) -> NaiveDate {
    as_of() - chrono::Duration::days(days)
}

pub(super) fn geography() -> GeographyRef {
    GeographyRef {
        building: Some("BLD-88".to_string()),
        community: Some("C1".to_string()),
        municipality: Some("M1".to_string()),
        region: Some("R1".to_string()),
    }
}

/// Condo subject addressed at the community level (no building id), so the
/// ladder starts at community.
pub(super) fn condo_form() -> SubjectForm {
    SubjectForm {
        deal: DealKind::Sale,
        category: PropertyCategory::Condo,
        style: None,
        bedrooms: Some(2),
        bathrooms: Some(2),
        exact_sqft: None,
        sqft_range: Some(AreaRangeForm {
            lower: 800,
            upper: 899,
        }),
        parking_spaces: Some(0),
        lockers: Some(0),
        building: None,
        community: Some("C1".to_string()),
        municipality: Some("M1".to_string()),
        region: Some("R1".to_string()),
        annual_tax: None,
        lot_frontage_ft: None,
        exclude_listing: None,
    }
}

pub(super) fn match_policy() -> MatchPolicy {
    MatchPolicy {
        tier_minimums: TierMinimums {
            building: 5,
            community: 5,
            municipality: 8,
            region: 12,
        },
        selection_cap: 10,
        lookback_days: 365,
        allow_repeat_sales: false,
        weights: SimilarityWeights::default(),
    }
}

pub(super) fn estimate_policy() -> EstimatePolicy {
    EstimatePolicy::default()
}

/// Closed condo sale in C1/M1/R1 matching the subject profile.
pub(super) fn close(id: &str, price: u64, close_date: NaiveDate) -> ComparableTransaction {
    ComparableTransaction {
        id: TransactionId(id.to_string()),
        deal: DealKind::Sale,
        status: ListingStatus::Closed,
        category: PropertyCategory::Condo,
        style: None,
        bedrooms: Some(2),
        bathrooms: Some(2),
        living_area: LivingArea::Range {
            lower: 800,
            upper: 899,
        },
        parking_spaces: 0,
        lockers: 0,
        geography: geography(),
        annual_tax: None,
        lot_frontage_ft: None,
        unit_key: Some(format!("unit-{id}")),
        close_price: price,
        close_date,
    }
}

pub(super) fn archive_of(records: Vec<ComparableTransaction>) -> TransactionArchive {
    TransactionArchive::from_records(records)
}
