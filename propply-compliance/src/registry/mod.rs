//! Dataset Registry
//!
//! Static catalog of the NYC Open Data datasets the service queries. Each
//! descriptor records which search keys the dataset actually supports,
//! how semantic fields map to its columns, and how it encodes boroughs,
//! blocks and lots.
//!
//! Several datasets answer a filter on a column they do not have with an
//! HTTP 400 instead of zero rows, so callers consult `supports()` before
//! building any query. The registry is validated once at construction and
//! is read-only afterwards.

mod catalog;

use std::collections::BTreeMap;
use std::fmt;

use propply_common::property::format_numeric;
use propply_common::Borough;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::ComplianceStatus;
use crate::soda::{FilterClause, RawRecord};

pub use catalog::{nyc_descriptors, HPD_REGISTRATIONS};

/// Compliance domains aggregated for every property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    HpdViolations,
    DobViolations,
    ElevatorInspections,
    BoilerInspections,
    ElectricalPermits,
    FdnyViolations,
}

impl Domain {
    pub const ALL: [Domain; 6] = [
        Domain::HpdViolations,
        Domain::DobViolations,
        Domain::ElevatorInspections,
        Domain::BoilerInspections,
        Domain::ElectricalPermits,
        Domain::FdnyViolations,
    ];

    /// Registry key of the dataset backing this domain
    pub fn as_str(self) -> &'static str {
        match self {
            Domain::HpdViolations => "hpd_violations",
            Domain::DobViolations => "dob_violations",
            Domain::ElevatorInspections => "elevator_inspections",
            Domain::BoilerInspections => "boiler_inspections",
            Domain::ElectricalPermits => "electrical_permits",
            Domain::FdnyViolations => "fdny_violations",
        }
    }

    /// Domains to aggregate, with or without FDNY
    pub fn selection(include_fdny: bool) -> Vec<Domain> {
        Self::ALL
            .into_iter()
            .filter(|d| include_fdny || *d != Domain::FdnyViolations)
            .collect()
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of property key a dataset can be filtered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchKeyKind {
    Bin,
    Bbl,
    BoroughBlockLot,
    Address,
}

impl SearchKeyKind {
    /// Most specific first
    pub const PRIORITY: [SearchKeyKind; 4] = [
        SearchKeyKind::Bin,
        SearchKeyKind::Bbl,
        SearchKeyKind::BoroughBlockLot,
        SearchKeyKind::Address,
    ];

    /// Semantic columns a dataset must map to support this key
    pub fn required_fields(self) -> &'static [SemanticField] {
        match self {
            SearchKeyKind::Bin => &[SemanticField::Bin],
            SearchKeyKind::Bbl => &[SemanticField::Bbl],
            SearchKeyKind::BoroughBlockLot => {
                &[SemanticField::Borough, SemanticField::Block, SemanticField::Lot]
            }
            SearchKeyKind::Address => &[SemanticField::HouseNumber, SemanticField::StreetName],
        }
    }
}

impl fmt::Display for SearchKeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchKeyKind::Bin => "BIN",
            SearchKeyKind::Bbl => "BBL",
            SearchKeyKind::BoroughBlockLot => "BOROUGH_BLOCK_LOT",
            SearchKeyKind::Address => "ADDRESS",
        };
        f.write_str(name)
    }
}

/// Dataset-independent field names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticField {
    Bin,
    Bbl,
    Borough,
    Block,
    Lot,
    HouseNumber,
    StreetName,
    ZipCode,
    RecordId,
    BuildingId,
    Status,
    StatusDetail,
    StatusDate,
    Category,
    ViolationClass,
    Description,
    IssuedDate,
    Disposition,
    RentImpairing,
    DeviceNumber,
    DeviceType,
    ReportType,
    DefectsExist,
    CompletionDate,
    PenaltyAmount,
    AmountPaid,
    IssuingAgency,
}

impl SemanticField {
    pub fn as_str(self) -> &'static str {
        match self {
            SemanticField::Bin => "bin",
            SemanticField::Bbl => "bbl",
            SemanticField::Borough => "borough",
            SemanticField::Block => "block",
            SemanticField::Lot => "lot",
            SemanticField::HouseNumber => "house_number",
            SemanticField::StreetName => "street_name",
            SemanticField::ZipCode => "zip_code",
            SemanticField::RecordId => "record_id",
            SemanticField::BuildingId => "building_id",
            SemanticField::Status => "status",
            SemanticField::StatusDetail => "status_detail",
            SemanticField::StatusDate => "status_date",
            SemanticField::Category => "category",
            SemanticField::ViolationClass => "violation_class",
            SemanticField::Description => "description",
            SemanticField::IssuedDate => "issued_date",
            SemanticField::Disposition => "disposition",
            SemanticField::RentImpairing => "rent_impairing",
            SemanticField::DeviceNumber => "device_number",
            SemanticField::DeviceType => "device_type",
            SemanticField::ReportType => "report_type",
            SemanticField::DefectsExist => "defects_exist",
            SemanticField::CompletionDate => "completion_date",
            SemanticField::PenaltyAmount => "penalty_amount",
            SemanticField::AmountPaid => "amount_paid",
            SemanticField::IssuingAgency => "issuing_agency",
        }
    }
}

impl fmt::Display for SemanticField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a dataset spells boroughs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoroughFormat {
    /// "1".."5"
    Code,
    /// "MANHATTAN", compared case-insensitively
    Name,
}

/// Condition a status rule tests against one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMatch {
    /// Case-insensitive substring
    Contains(&'static str),
    /// Case-insensitive whole value
    Equals(&'static str),
    /// Field missing or blank
    Blank,
}

/// One entry of a dataset's ordered status vocabulary; first match wins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRule {
    pub field: SemanticField,
    pub matcher: StatusMatch,
    pub status: ComplianceStatus,
}

impl StatusRule {
    pub const fn contains(field: SemanticField, pattern: &'static str, status: ComplianceStatus) -> Self {
        Self {
            field,
            matcher: StatusMatch::Contains(pattern),
            status,
        }
    }

    pub const fn equals(field: SemanticField, value: &'static str, status: ComplianceStatus) -> Self {
        Self {
            field,
            matcher: StatusMatch::Equals(value),
            status,
        }
    }

    pub const fn blank(field: SemanticField, status: ComplianceStatus) -> Self {
        Self {
            field,
            matcher: StatusMatch::Blank,
            status,
        }
    }

    /// Test the rule against a field value
    pub fn matches(&self, value: Option<&str>) -> bool {
        let value = value.map(str::trim).filter(|v| !v.is_empty());
        match (self.matcher, value) {
            (StatusMatch::Blank, None) => true,
            (StatusMatch::Blank, Some(_)) => false,
            (_, None) => false,
            (StatusMatch::Contains(pattern), Some(v)) => {
                v.to_uppercase().contains(&pattern.to_uppercase())
            }
            (StatusMatch::Equals(expected), Some(v)) => v.eq_ignore_ascii_case(expected),
        }
    }
}

/// Static description of one upstream dataset
#[derive(Debug, Clone)]
pub struct DatasetDescriptor {
    /// Registry key ("hpd_violations")
    pub key: &'static str,
    /// Socrata four-by-four id ("wvxf-dwi5")
    pub dataset_id: &'static str,
    pub name: &'static str,
    pub search_keys: Vec<SearchKeyKind>,
    pub columns: BTreeMap<SemanticField, &'static str>,
    /// Fields requested with `$select`
    pub select: Vec<SemanticField>,
    /// Newest-first ordering column
    pub order_by: Option<SemanticField>,
    pub default_limit: usize,
    pub borough_format: BoroughFormat,
    /// Block width the dataset stores (`None` = no leading zeros)
    pub block_width: Option<usize>,
    pub lot_width: Option<usize>,
    /// Filters added to every query (restricts shared datasets to one agency)
    pub scope: Vec<FilterClause>,
    pub status_rules: Vec<StatusRule>,
    /// Position in the resolver's dataset order; `None` = not used for resolution
    pub resolver_rank: Option<u8>,
}

impl DatasetDescriptor {
    pub fn supports(&self, kind: SearchKeyKind) -> bool {
        self.search_keys.contains(&kind)
    }

    pub fn column(&self, field: SemanticField) -> Option<&'static str> {
        self.columns.get(&field).copied()
    }

    pub fn has_column(&self, field: SemanticField) -> bool {
        self.columns.contains_key(&field)
    }

    /// Scalar value of a semantic field in a raw row, trimmed; blank is absent
    pub fn text(&self, row: &RawRecord, field: SemanticField) -> Option<String> {
        let value = match row.get(self.column(field)?)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// Borough value as this dataset stores it
    pub fn format_borough(&self, borough: Borough) -> String {
        match self.borough_format {
            BoroughFormat::Code => borough.code().to_string(),
            BoroughFormat::Name => borough.name().to_string(),
        }
    }

    /// Block value as this dataset stores it
    pub fn format_block(&self, block: &str) -> Option<String> {
        format_numeric(block, self.block_width)
    }

    /// Lot value as this dataset stores it
    pub fn format_lot(&self, lot: &str) -> Option<String> {
        format_numeric(lot, self.lot_width)
    }

    /// Check that every declared key and selected field is backed by a column
    fn validate(&self) -> Result<(), RegistryError> {
        for kind in &self.search_keys {
            for field in kind.required_fields() {
                if !self.has_column(*field) {
                    return Err(RegistryError::InvalidDescriptor {
                        key: self.key.to_string(),
                        reason: format!("declares {} search but maps no {} column", kind, field),
                    });
                }
            }
        }
        let referenced = self
            .select
            .iter()
            .chain(self.order_by.iter())
            .chain(self.status_rules.iter().map(|r| &r.field))
            .chain(self.scope.iter().map(|c| &c.field));
        for field in referenced {
            if !self.has_column(*field) {
                return Err(RegistryError::InvalidDescriptor {
                    key: self.key.to_string(),
                    reason: format!("references unmapped field {}", field),
                });
            }
        }
        if self.default_limit == 0 {
            return Err(RegistryError::InvalidDescriptor {
                key: self.key.to_string(),
                reason: "default limit must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Unknown domain: {0}")]
    UnknownDomain(String),

    #[error("Invalid dataset descriptor {key}: {reason}")]
    InvalidDescriptor { key: String, reason: String },
}

/// Validated, immutable set of dataset descriptors
#[derive(Debug, Clone)]
pub struct DatasetRegistry {
    descriptors: BTreeMap<&'static str, DatasetDescriptor>,
}

impl DatasetRegistry {
    /// Build a registry, rejecting descriptors that cannot express their own search keys
    pub fn new(descriptors: Vec<DatasetDescriptor>) -> Result<Self, RegistryError> {
        let mut map = BTreeMap::new();
        for descriptor in descriptors {
            descriptor.validate()?;
            if map.contains_key(descriptor.key) {
                return Err(RegistryError::InvalidDescriptor {
                    key: descriptor.key.to_string(),
                    reason: "registered twice".to_string(),
                });
            }
            map.insert(descriptor.key, descriptor);
        }
        Ok(Self { descriptors: map })
    }

    /// Built-in NYC Open Data catalog, checked to cover every compliance domain
    pub fn nyc() -> Result<Self, RegistryError> {
        let registry = Self::new(nyc_descriptors())?;
        registry.ensure_domains(&Domain::ALL)?;
        Ok(registry)
    }

    /// Override every descriptor's page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        for descriptor in self.descriptors.values_mut() {
            descriptor.default_limit = page_size;
        }
        self
    }

    pub fn descriptor_for(&self, key: &str) -> Result<&DatasetDescriptor, RegistryError> {
        self.descriptors
            .get(key)
            .ok_or_else(|| RegistryError::UnknownDomain(key.to_string()))
    }

    pub fn descriptor_for_domain(&self, domain: Domain) -> Result<&DatasetDescriptor, RegistryError> {
        self.descriptor_for(domain.as_str())
    }

    /// Fail unless every listed domain has a descriptor
    pub fn ensure_domains(&self, domains: &[Domain]) -> Result<(), RegistryError> {
        for domain in domains {
            self.descriptor_for_domain(*domain)?;
        }
        Ok(())
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &DatasetDescriptor> {
        self.descriptors.values()
    }

    /// Address-capable datasets in resolver order
    pub fn address_datasets(&self) -> Vec<&DatasetDescriptor> {
        let mut datasets: Vec<_> = self
            .descriptors
            .values()
            .filter(|d| d.resolver_rank.is_some() && d.supports(SearchKeyKind::Address))
            .collect();
        datasets.sort_by_key(|d| d.resolver_rank);
        datasets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> DatasetRegistry {
        DatasetRegistry::nyc().unwrap()
    }

    #[test]
    fn test_nyc_catalog_is_valid() {
        let registry = registry();
        assert_eq!(registry.descriptors().count(), 7);
        for domain in Domain::ALL {
            assert!(registry.descriptor_for_domain(domain).is_ok(), "{} missing", domain);
        }
    }

    #[test]
    fn test_unknown_domain() {
        let err = registry().descriptor_for("parking_tickets").unwrap_err();
        assert_eq!(err, RegistryError::UnknownDomain("parking_tickets".to_string()));
    }

    #[test]
    fn test_boiler_supports_bin_only() {
        let registry = registry();
        let boiler = registry.descriptor_for_domain(Domain::BoilerInspections).unwrap();
        assert_eq!(boiler.search_keys, vec![SearchKeyKind::Bin]);
        assert_eq!(boiler.column(SemanticField::Bin), Some("bin_number"));
        assert!(!boiler.has_column(SemanticField::HouseNumber));
    }

    #[test]
    fn test_fdny_has_no_bin() {
        let registry = registry();
        let fdny = registry.descriptor_for_domain(Domain::FdnyViolations).unwrap();
        assert!(!fdny.supports(SearchKeyKind::Bin));
        assert!(fdny.supports(SearchKeyKind::BoroughBlockLot));
        assert_eq!(fdny.format_block("1073").as_deref(), Some("01073"));
        assert_eq!(fdny.format_lot("1").as_deref(), Some("0001"));
        assert_eq!(fdny.format_borough(Borough::Manhattan), "MANHATTAN");
    }

    #[test]
    fn test_padding_width_is_per_dataset() {
        let registry = registry();
        let dob = registry.descriptor_for_domain(Domain::DobViolations).unwrap();
        let hpd = registry.descriptor_for_domain(Domain::HpdViolations).unwrap();

        assert_eq!(dob.format_lot("0001").as_deref(), Some("00001"));
        assert_eq!(hpd.format_lot("0001").as_deref(), Some("1"));
        assert_eq!(hpd.format_block("01073").as_deref(), Some("1073"));
        assert_eq!(dob.format_borough(Borough::Brooklyn), "3");
    }

    #[test]
    fn test_address_datasets_order() {
        let registry = registry();
        let keys: Vec<_> = registry.address_datasets().iter().map(|d| d.key).collect();
        assert_eq!(keys.first(), Some(&HPD_REGISTRATIONS));
        assert!(!keys.contains(&Domain::BoilerInspections.as_str()));
    }

    #[test]
    fn test_descriptor_declaring_unmapped_key_is_rejected() {
        let mut broken = nyc_descriptors()
            .into_iter()
            .find(|d| d.key == "boiler_inspections")
            .unwrap();
        broken.search_keys.push(SearchKeyKind::Address);

        let err = DatasetRegistry::new(vec![broken]).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidDescriptor { .. }));
    }

    #[test]
    fn test_missing_domain_is_fatal() {
        let partial: Vec<_> = nyc_descriptors()
            .into_iter()
            .filter(|d| d.key != "fdny_violations")
            .collect();
        let registry = DatasetRegistry::new(partial).unwrap();
        let err = registry.ensure_domains(&Domain::ALL).unwrap_err();
        assert_eq!(err, RegistryError::UnknownDomain("fdny_violations".to_string()));
    }

    #[test]
    fn test_status_rule_matching() {
        let rule = StatusRule::contains(SemanticField::Status, "open", ComplianceStatus::Active);
        assert!(rule.matches(Some("Open")));
        assert!(!rule.matches(Some("Close")));
        assert!(!rule.matches(None));

        let blank = StatusRule::blank(SemanticField::Disposition, ComplianceStatus::Pending);
        assert!(blank.matches(None));
        assert!(blank.matches(Some("  ")));
        assert!(!blank.matches(Some("resolved")));

        let exact = StatusRule::equals(SemanticField::Status, "A", ComplianceStatus::Active);
        assert!(exact.matches(Some("a")));
        assert!(!exact.matches(Some("INACTIVE")));
    }

    #[test]
    fn test_semantic_field_display() {
        assert_eq!(SemanticField::HouseNumber.to_string(), "house_number");
        assert_eq!(SearchKeyKind::BoroughBlockLot.to_string(), "BOROUGH_BLOCK_LOT");
    }
}
