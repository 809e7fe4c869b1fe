use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer};

use super::domain::{
    ComparableTransaction, DealKind, GeographyRef, ListingStatus, LivingArea, PropertyCategory,
    TransactionId,
};
use super::repository::{StoreError, TransactionQuery, TransactionScan, TransactionStore};

/// In-memory transaction population hydrated from a CSV export of the
/// ingestion pipeline. Backs the demo server, the one-shot CLI commands,
/// and the rollup batch.
#[derive(Debug, Default, Clone)]
pub struct TransactionArchive {
    records: Vec<ComparableTransaction>,
}

impl TransactionArchive {
    pub fn from_records(records: Vec<ComparableTransaction>) -> Self {
        Self { records }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let file = File::open(path.as_ref()).map_err(|source| ArchiveError::Open {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ArchiveError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for (index, row) in csv_reader.deserialize::<ArchiveRow>().enumerate() {
            let row = row?;
            let record = row.into_transaction().map_err(|message| ArchiveError::Row {
                // header occupies line 1
                line: index + 2,
                message,
            })?;
            records.push(record);
        }

        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl TransactionStore for TransactionArchive {
    fn closed_transactions(
        &self,
        query: &TransactionQuery<'_>,
    ) -> Result<Vec<ComparableTransaction>, StoreError> {
        let matches = self
            .records
            .iter()
            .filter(|txn| txn.status == ListingStatus::Closed)
            .filter(|txn| txn.deal == query.deal)
            .filter(|txn| txn.category == query.category)
            .filter(|txn| txn.geography.key_for(query.scope) == Some(query.scope_key))
            .filter(|txn| txn.close_date >= query.closed_on_or_after)
            .filter(|txn| Some(&txn.id) != query.exclude)
            .cloned()
            .collect();
        Ok(matches)
    }
}

impl TransactionScan for TransactionArchive {
    fn all_closed(&self) -> Result<Vec<ComparableTransaction>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|txn| txn.status == ListingStatus::Closed)
            .cloned()
            .collect())
    }
}

/// Import failure for the CSV archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("unable to open archive '{path}': {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("unable to parse archive csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("archive row {line}: {message}")]
    Row { line: usize, message: String },
}

#[derive(Debug, Deserialize)]
struct ArchiveRow {
    #[serde(rename = "Transaction ID")]
    transaction_id: String,
    #[serde(rename = "Deal")]
    deal: String,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Category")]
    category: String,
    #[serde(rename = "Style", default, deserialize_with = "empty_string_as_none")]
    style: Option<String>,
    #[serde(rename = "Bedrooms", default)]
    bedrooms: Option<u8>,
    #[serde(rename = "Bathrooms", default)]
    bathrooms: Option<u8>,
    #[serde(rename = "Sqft", default)]
    sqft: Option<u32>,
    #[serde(rename = "Sqft Low", default)]
    sqft_low: Option<u32>,
    #[serde(rename = "Sqft High", default)]
    sqft_high: Option<u32>,
    #[serde(rename = "Parking", default)]
    parking: Option<u8>,
    #[serde(rename = "Lockers", default)]
    lockers: Option<u8>,
    #[serde(rename = "Building", default, deserialize_with = "empty_string_as_none")]
    building: Option<String>,
    #[serde(
        rename = "Community",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    community: Option<String>,
    #[serde(
        rename = "Municipality",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    municipality: Option<String>,
    #[serde(rename = "Region", default, deserialize_with = "empty_string_as_none")]
    region: Option<String>,
    #[serde(rename = "Annual Tax", default)]
    annual_tax: Option<u32>,
    #[serde(rename = "Lot Frontage", default)]
    lot_frontage: Option<u16>,
    #[serde(rename = "Unit Key", default, deserialize_with = "empty_string_as_none")]
    unit_key: Option<String>,
    #[serde(rename = "Close Price")]
    close_price: u64,
    #[serde(rename = "Close Date")]
    close_date: String,
}

impl ArchiveRow {
    fn into_transaction(self) -> Result<ComparableTransaction, String> {
        let deal = match self.deal.to_ascii_lowercase().as_str() {
            "sale" => DealKind::Sale,
            "lease" | "rent" => DealKind::Lease,
            other => return Err(format!("unknown deal kind '{other}'")),
        };

        let status = match self.status.to_ascii_lowercase().as_str() {
            "closed" | "sold" | "leased" => ListingStatus::Closed,
            "active" => ListingStatus::Active,
            "pending" | "conditional" => ListingStatus::Pending,
            other => return Err(format!("unknown status '{other}'")),
        };

        let category = match self.category.to_ascii_lowercase().as_str() {
            "condo" | "condo_apartment" => PropertyCategory::Condo,
            "townhouse" | "condo_townhouse" => PropertyCategory::Townhouse,
            "semi_detached" | "semi-detached" => PropertyCategory::SemiDetached,
            "detached" => PropertyCategory::Detached,
            "multiplex" | "duplex" | "triplex" => PropertyCategory::Multiplex,
            other => return Err(format!("unknown category '{other}'")),
        };

        let living_area = match (self.sqft, self.sqft_low, self.sqft_high) {
            (Some(sqft), _, _) => LivingArea::Exact(sqft),
            (None, Some(lower), Some(upper)) if lower <= upper => {
                LivingArea::Range { lower, upper }
            }
            (None, Some(lower), Some(upper)) => {
                return Err(format!("inverted sqft range {lower}-{upper}"))
            }
            _ => return Err("missing living area".to_string()),
        };

        let close_date = parse_close_date(&self.close_date)
            .ok_or_else(|| format!("unparseable close date '{}'", self.close_date))?;

        Ok(ComparableTransaction {
            id: TransactionId(self.transaction_id),
            deal,
            status,
            category,
            style: self.style,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            living_area,
            parking_spaces: self.parking.unwrap_or(0),
            lockers: self.lockers.unwrap_or(0),
            geography: GeographyRef {
                building: self.building,
                community: self.community,
                municipality: self.municipality,
                region: self.region,
            },
            annual_tax: self.annual_tax,
            lot_frontage_ft: self.lot_frontage,
            unit_key: self.unit_key,
            close_price: self.close_price,
            close_date,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_close_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc().date());
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()
}
