use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for historical transactions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

/// Identifier for the tenant whose population and settings a request runs against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

/// Direction of the transaction being valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealKind {
    Sale,
    Lease,
}

impl DealKind {
    pub const fn label(self) -> &'static str {
        match self {
            DealKind::Sale => "sale",
            DealKind::Lease => "lease",
        }
    }
}

/// Coarse property category; the free-form `style` field on a unit carries
/// the subcategory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyCategory {
    Condo,
    Townhouse,
    SemiDetached,
    Detached,
    Multiplex,
}

impl PropertyCategory {
    pub const fn label(self) -> &'static str {
        match self {
            PropertyCategory::Condo => "condo",
            PropertyCategory::Townhouse => "townhouse",
            PropertyCategory::SemiDetached => "semi_detached",
            PropertyCategory::Detached => "detached",
            PropertyCategory::Multiplex => "multiplex",
        }
    }

    /// Condo-style stock repeats within one building, so the narrowest
    /// comparable scope is the building itself. Freehold homes rarely close
    /// twice at one address and are searched by community instead.
    pub const fn is_building_centric(self) -> bool {
        matches!(self, PropertyCategory::Condo)
    }
}

/// Lifecycle state of a listing in the historical archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Closed,
    Active,
    Pending,
}

/// Living area as recorded on the listing: an exact measurement, or the
/// coarse marketing bucket when no measurement exists. Exactly one of the
/// two is ever authoritative for a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivingArea {
    Exact(u32),
    Range { lower: u32, upper: u32 },
}

impl LivingArea {
    /// Midpoint used where a single number is unavoidable (display, deltas).
    pub fn midpoint(&self) -> f64 {
        match *self {
            LivingArea::Exact(sqft) => f64::from(sqft),
            LivingArea::Range { lower, upper } => (f64::from(lower) + f64::from(upper)) / 2.0,
        }
    }

    pub fn exact(&self) -> Option<u32> {
        match *self {
            LivingArea::Exact(sqft) => Some(sqft),
            LivingArea::Range { .. } => None,
        }
    }
}

/// Nested geographic scopes a comparable search can address, narrowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoScope {
    Building,
    Community,
    Municipality,
    Region,
}

impl GeoScope {
    pub const fn label(self) -> &'static str {
        match self {
            GeoScope::Building => "building",
            GeoScope::Community => "community",
            GeoScope::Municipality => "municipality",
            GeoScope::Region => "region",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "building" => Some(GeoScope::Building),
            "community" => Some(GeoScope::Community),
            "municipality" => Some(GeoScope::Municipality),
            "region" => Some(GeoScope::Region),
            _ => None,
        }
    }
}

/// Geographic identifiers for a unit at each administrative level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeographyRef {
    pub building: Option<String>,
    pub community: Option<String>,
    pub municipality: Option<String>,
    pub region: Option<String>,
}

impl GeographyRef {
    pub fn key_for(&self, scope: GeoScope) -> Option<&str> {
        let key = match scope {
            GeoScope::Building => self.building.as_deref(),
            GeoScope::Community => self.community.as_deref(),
            GeoScope::Municipality => self.municipality.as_deref(),
            GeoScope::Region => self.region.as_deref(),
        };
        key.filter(|value| !value.trim().is_empty())
    }

    /// True when the narrowest level (building or community) is identified.
    pub fn has_narrow_level(&self) -> bool {
        self.key_for(GeoScope::Building).is_some() || self.key_for(GeoScope::Community).is_some()
    }
}

/// Canonical, validated description of the unit being valued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub deal: DealKind,
    pub category: PropertyCategory,
    pub style: Option<String>,
    pub bedrooms: Option<u8>,
    pub bathrooms: Option<u8>,
    pub living_area: LivingArea,
    pub parking_spaces: u8,
    pub lockers: u8,
    pub geography: GeographyRef,
    pub annual_tax: Option<u32>,
    pub lot_frontage_ft: Option<u16>,
    pub exclude_listing: Option<TransactionId>,
}

/// One historical closed transaction as supplied by the ingestion
/// collaborator. The engine only reads these records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparableTransaction {
    pub id: TransactionId,
    pub deal: DealKind,
    pub status: ListingStatus,
    pub category: PropertyCategory,
    pub style: Option<String>,
    pub bedrooms: Option<u8>,
    pub bathrooms: Option<u8>,
    pub living_area: LivingArea,
    pub parking_spaces: u8,
    pub lockers: u8,
    pub geography: GeographyRef,
    pub annual_tax: Option<u32>,
    pub lot_frontage_ft: Option<u16>,
    /// Stable key for the underlying physical unit, used to deduplicate
    /// repeat closes inside the lookback window.
    pub unit_key: Option<String>,
    pub close_price: u64,
    pub close_date: NaiveDate,
}

impl ComparableTransaction {
    /// One-line description used by narratives and CLI output.
    pub fn short_summary(&self) -> String {
        let beds = self
            .bedrooms
            .map(|count| count.to_string())
            .unwrap_or_else(|| "?".to_string());
        let baths = self
            .bathrooms
            .map(|count| count.to_string())
            .unwrap_or_else(|| "?".to_string());
        let area = match self.living_area {
            LivingArea::Exact(sqft) => format!("{sqft} sqft"),
            LivingArea::Range { lower, upper } => format!("{lower}-{upper} sqft"),
        };
        format!(
            "{} {} bed/{} bath {} closed {} at {}",
            self.category.label(),
            beds,
            baths,
            area,
            self.close_date,
            self.close_price
        )
    }
}
