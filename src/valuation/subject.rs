use serde::{Deserialize, Serialize};

use super::domain::{
    DealKind, GeographyRef, LivingArea, PropertyCategory, TransactionId, UnitSpec,
};

/// Raw subject description as submitted by a caller. Counts arrive signed so
/// that malformed input can be rejected explicitly instead of wrapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectForm {
    pub deal: DealKind,
    pub category: PropertyCategory,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub bedrooms: Option<i16>,
    #[serde(default)]
    pub bathrooms: Option<i16>,
    #[serde(default)]
    pub exact_sqft: Option<u32>,
    #[serde(default)]
    pub sqft_range: Option<AreaRangeForm>,
    #[serde(default)]
    pub parking_spaces: Option<i16>,
    #[serde(default)]
    pub lockers: Option<i16>,
    #[serde(default)]
    pub building: Option<String>,
    #[serde(default)]
    pub community: Option<String>,
    #[serde(default)]
    pub municipality: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub annual_tax: Option<u32>,
    #[serde(default)]
    pub lot_frontage_ft: Option<u16>,
    #[serde(default)]
    pub exclude_listing: Option<String>,
}

/// Coarse marketing bucket for units without a measured floor plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaRangeForm {
    pub lower: u32,
    pub upper: u32,
}

/// Rejection reasons for a malformed subject. These are caller faults and
/// are never retried.
#[derive(Debug, thiserror::Error)]
pub enum InvalidSpecError {
    #[error("living area is required: provide an exact square footage or a range bucket")]
    MissingArea,
    #[error("living area range is inverted ({lower} > {upper})")]
    InvertedAreaRange { lower: u32, upper: u32 },
    #[error("a building or community identifier is required")]
    MissingGeography,
    #[error("{field} must not be negative (got {value})")]
    NegativeCount { field: &'static str, value: i16 },
}

/// Canonicalize a raw subject into a validated [`UnitSpec`].
///
/// Pure transform: no I/O, no defaults beyond the documented ones. An exact
/// square footage is authoritative whenever present; a supplied range bucket
/// only applies when no measurement exists.
pub fn normalize_subject(form: SubjectForm) -> Result<UnitSpec, InvalidSpecError> {
    let living_area = match (form.exact_sqft, form.sqft_range) {
        (Some(sqft), _) => LivingArea::Exact(sqft),
        (None, Some(range)) => {
            if range.lower > range.upper {
                return Err(InvalidSpecError::InvertedAreaRange {
                    lower: range.lower,
                    upper: range.upper,
                });
            }
            LivingArea::Range {
                lower: range.lower,
                upper: range.upper,
            }
        }
        (None, None) => return Err(InvalidSpecError::MissingArea),
    };

    let geography = GeographyRef {
        building: clean(form.building),
        community: clean(form.community),
        municipality: clean(form.municipality),
        region: clean(form.region),
    };
    if !geography.has_narrow_level() {
        return Err(InvalidSpecError::MissingGeography);
    }

    let bedrooms = non_negative("bedrooms", form.bedrooms)?;
    let bathrooms = non_negative("bathrooms", form.bathrooms)?;
    let parking_spaces = non_negative("parking_spaces", form.parking_spaces)?.unwrap_or(0);
    let lockers = non_negative("lockers", form.lockers)?.unwrap_or(0);

    Ok(UnitSpec {
        deal: form.deal,
        category: form.category,
        style: clean(form.style),
        bedrooms,
        bathrooms,
        living_area,
        parking_spaces,
        lockers,
        geography,
        annual_tax: form.annual_tax,
        lot_frontage_ft: form.lot_frontage_ft,
        exclude_listing: clean(form.exclude_listing).map(TransactionId),
    })
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

fn non_negative(field: &'static str, value: Option<i16>) -> Result<Option<u8>, InvalidSpecError> {
    match value {
        None => Ok(None),
        Some(count) if count < 0 => Err(InvalidSpecError::NegativeCount { field, value: count }),
        Some(count) => Ok(Some(count.min(i16::from(u8::MAX)) as u8)),
    }
}
