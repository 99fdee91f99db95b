//! Built-in NYC Open Data catalog
//!
//! Column names and encodings as published on data.cityofnewyork.us.

use std::collections::BTreeMap;

use super::{BoroughFormat, DatasetDescriptor, SearchKeyKind, SemanticField, StatusRule};
use crate::models::ComplianceStatus::{Active, Closed, Dismissed, Pending};
use crate::soda::FilterClause;

use SemanticField::*;

/// Registration dataset carrying address and identifiers together
pub const HPD_REGISTRATIONS: &str = "hpd_registrations";

fn columns(pairs: &[(SemanticField, &'static str)]) -> BTreeMap<SemanticField, &'static str> {
    pairs.iter().copied().collect()
}

/// Every dataset the service knows about
pub fn nyc_descriptors() -> Vec<DatasetDescriptor> {
    vec![
        hpd_registrations(),
        hpd_violations(),
        dob_violations(),
        elevator_inspections(),
        boiler_inspections(),
        electrical_permits(),
        fdny_violations(),
    ]
}

fn hpd_registrations() -> DatasetDescriptor {
    DatasetDescriptor {
        key: HPD_REGISTRATIONS,
        dataset_id: "hv8p-yzbx",
        name: "HPD Multiple Dwelling Registrations",
        search_keys: vec![SearchKeyKind::Bin, SearchKeyKind::BoroughBlockLot, SearchKeyKind::Address],
        columns: columns(&[
            (RecordId, "registrationid"),
            (BuildingId, "buildingid"),
            (Bin, "bin"),
            (Borough, "boroid"),
            (Block, "block"),
            (Lot, "lot"),
            (HouseNumber, "housenumber"),
            (StreetName, "streetname"),
            (ZipCode, "zip"),
        ]),
        select: vec![RecordId, BuildingId, Bin, Borough, Block, Lot, HouseNumber, StreetName, ZipCode],
        order_by: None,
        default_limit: 50,
        borough_format: BoroughFormat::Code,
        block_width: None,
        lot_width: None,
        scope: Vec::new(),
        status_rules: Vec::new(),
        resolver_rank: Some(0),
    }
}

fn hpd_violations() -> DatasetDescriptor {
    DatasetDescriptor {
        key: "hpd_violations",
        dataset_id: "wvxf-dwi5",
        name: "HPD Housing Maintenance Code Violations",
        search_keys: vec![SearchKeyKind::Bin, SearchKeyKind::BoroughBlockLot, SearchKeyKind::Address],
        columns: columns(&[
            (RecordId, "violationid"),
            (BuildingId, "buildingid"),
            (Bin, "bin"),
            (Borough, "boroid"),
            (Block, "block"),
            (Lot, "lot"),
            (HouseNumber, "housenumber"),
            (StreetName, "streetname"),
            (ZipCode, "zip"),
            (Status, "violationstatus"),
            (StatusDetail, "currentstatus"),
            (ViolationClass, "class"),
            (IssuedDate, "inspectiondate"),
            (Description, "novdescription"),
            (RentImpairing, "rentimpairing"),
        ]),
        select: vec![
            RecordId, Bin, Borough, Block, Lot, HouseNumber, StreetName, ZipCode, Status,
            StatusDetail, ViolationClass, IssuedDate, Description, RentImpairing,
        ],
        order_by: Some(IssuedDate),
        default_limit: 1000,
        borough_format: BoroughFormat::Code,
        block_width: None,
        lot_width: None,
        scope: Vec::new(),
        status_rules: vec![
            StatusRule::contains(StatusDetail, "DISMISS", Dismissed),
            StatusRule::contains(Status, "OPEN", Active),
            StatusRule::contains(Status, "CLOSE", Closed),
        ],
        resolver_rank: Some(1),
    }
}

fn dob_violations() -> DatasetDescriptor {
    DatasetDescriptor {
        key: "dob_violations",
        dataset_id: "3h2n-5cm9",
        name: "DOB Violations",
        search_keys: vec![SearchKeyKind::Bin, SearchKeyKind::BoroughBlockLot, SearchKeyKind::Address],
        columns: columns(&[
            (RecordId, "isn_dob_bis_viol"),
            (Bin, "bin"),
            (Borough, "boro"),
            (Block, "block"),
            (Lot, "lot"),
            (HouseNumber, "house_number"),
            (StreetName, "street"),
            (Status, "violation_category"),
            (Category, "violation_type"),
            (IssuedDate, "issue_date"),
            (Disposition, "disposition_comments"),
            (Description, "description"),
        ]),
        select: vec![
            RecordId, Bin, Borough, Block, Lot, HouseNumber, StreetName, Status, Category,
            IssuedDate, Disposition, Description,
        ],
        order_by: Some(IssuedDate),
        default_limit: 1000,
        borough_format: BoroughFormat::Code,
        block_width: Some(5),
        lot_width: Some(5),
        scope: Vec::new(),
        status_rules: vec![
            StatusRule::contains(Status, "DISMISS", Dismissed),
            StatusRule::contains(Status, "RESOLVE", Closed),
            StatusRule::contains(Status, "ACTIVE", Active),
            StatusRule::blank(Disposition, Pending),
        ],
        resolver_rank: None,
    }
}

fn elevator_inspections() -> DatasetDescriptor {
    DatasetDescriptor {
        key: "elevator_inspections",
        dataset_id: "e5aq-a4j2",
        name: "DOB NOW Elevator Devices",
        search_keys: vec![SearchKeyKind::Bin, SearchKeyKind::BoroughBlockLot, SearchKeyKind::Address],
        columns: columns(&[
            (DeviceNumber, "device_number"),
            (Bin, "bin"),
            (Borough, "borough"),
            (Block, "block"),
            (Lot, "lot"),
            (HouseNumber, "house_number"),
            (StreetName, "street_name"),
            (ZipCode, "zip_code"),
            (DeviceType, "device_type"),
            (Status, "device_status"),
            (StatusDate, "status_date"),
        ]),
        select: vec![
            DeviceNumber, Bin, Borough, Block, Lot, HouseNumber, StreetName, ZipCode,
            DeviceType, Status, StatusDate,
        ],
        order_by: Some(StatusDate),
        default_limit: 500,
        borough_format: BoroughFormat::Name,
        block_width: None,
        lot_width: None,
        scope: Vec::new(),
        status_rules: vec![
            StatusRule::contains(Status, "INACTIVE", Closed),
            StatusRule::contains(Status, "REMOVED", Closed),
            StatusRule::contains(Status, "DISMANTLED", Closed),
            StatusRule::equals(Status, "A", Active),
            StatusRule::contains(Status, "ACTIVE", Active),
        ],
        resolver_rank: Some(2),
    }
}

fn boiler_inspections() -> DatasetDescriptor {
    DatasetDescriptor {
        key: "boiler_inspections",
        dataset_id: "52dp-yji6",
        name: "DOB NOW Safety Boiler",
        // No address or block/lot columns; a filter on them is rejected with 400
        search_keys: vec![SearchKeyKind::Bin],
        columns: columns(&[
            (RecordId, "tracking_number"),
            (DeviceNumber, "boiler_id"),
            (Bin, "bin_number"),
            (ReportType, "report_type"),
            (IssuedDate, "inspection_date"),
            (DefectsExist, "defects_exist"),
            (Status, "report_status"),
            (DeviceType, "pressure_type"),
            (Description, "boiler_make"),
        ]),
        select: vec![
            RecordId, DeviceNumber, Bin, ReportType, IssuedDate, DefectsExist, Status,
            DeviceType, Description,
        ],
        order_by: Some(IssuedDate),
        default_limit: 500,
        borough_format: BoroughFormat::Code,
        block_width: None,
        lot_width: None,
        scope: Vec::new(),
        status_rules: vec![
            StatusRule::equals(DefectsExist, "YES", Active),
            StatusRule::contains(Status, "REJECT", Active),
            StatusRule::contains(Status, "NO REPORT", Active),
            StatusRule::contains(Status, "PENDING", Pending),
            StatusRule::contains(Status, "REVIEW", Pending),
            StatusRule::contains(Status, "ACCEPT", Closed),
        ],
        resolver_rank: None,
    }
}

fn electrical_permits() -> DatasetDescriptor {
    DatasetDescriptor {
        key: "electrical_permits",
        dataset_id: "dm9a-ab7w",
        name: "DOB NOW Electrical Permit Applications",
        search_keys: vec![SearchKeyKind::Bin, SearchKeyKind::BoroughBlockLot, SearchKeyKind::Address],
        columns: columns(&[
            (RecordId, "job_filing_number"),
            (Bin, "bin"),
            (Borough, "borough"),
            (Block, "block"),
            (Lot, "lot"),
            (HouseNumber, "house_number"),
            (StreetName, "street_name"),
            (ZipCode, "zip_code"),
            (Status, "filing_status"),
            (IssuedDate, "filing_date"),
            (CompletionDate, "completion_date"),
            (Description, "job_description"),
        ]),
        select: vec![
            RecordId, Bin, Borough, Block, Lot, HouseNumber, StreetName, ZipCode, Status,
            IssuedDate, CompletionDate, Description,
        ],
        order_by: Some(IssuedDate),
        default_limit: 500,
        borough_format: BoroughFormat::Name,
        block_width: None,
        lot_width: None,
        scope: Vec::new(),
        status_rules: vec![
            StatusRule::contains(Status, "WITHDRAW", Dismissed),
            StatusRule::contains(Status, "CANCEL", Dismissed),
            StatusRule::contains(Status, "SIGN", Closed),
            StatusRule::contains(Status, "COMPLETE", Closed),
            StatusRule::contains(Status, "PERMIT ISSUED", Active),
            StatusRule::contains(Status, "APPROVED", Active),
            StatusRule::contains(Status, "IN PROCESS", Active),
            StatusRule::contains(Status, "ACTIVE", Active),
            StatusRule::contains(Status, "FILED", Pending),
            StatusRule::contains(Status, "PENDING", Pending),
            StatusRule::contains(Status, "REVIEW", Pending),
        ],
        resolver_rank: None,
    }
}

fn fdny_violations() -> DatasetDescriptor {
    DatasetDescriptor {
        key: "fdny_violations",
        dataset_id: "avgm-ztsb",
        name: "OATH Hearings Division Cases (FDNY)",
        // OATH carries location fields but no BIN
        search_keys: vec![SearchKeyKind::BoroughBlockLot, SearchKeyKind::Address],
        columns: columns(&[
            (RecordId, "ticket_number"),
            (IssuingAgency, "issuing_agency"),
            (Borough, "violation_location_borough"),
            (Block, "violation_location_block_no"),
            (Lot, "violation_location_lot_no"),
            (HouseNumber, "violation_location_house"),
            (StreetName, "violation_location_street_name"),
            (ZipCode, "violation_location_zip_code"),
            (IssuedDate, "violation_date"),
            (Description, "charge_1_code_description"),
            (Status, "hearing_status"),
            (PenaltyAmount, "total_violation_amount"),
            (AmountPaid, "paid_amount"),
        ]),
        select: vec![
            RecordId, Borough, Block, Lot, HouseNumber, StreetName, ZipCode, IssuedDate,
            Description, Status, PenaltyAmount, AmountPaid,
        ],
        order_by: Some(IssuedDate),
        default_limit: 500,
        borough_format: BoroughFormat::Name,
        block_width: Some(5),
        lot_width: Some(4),
        scope: vec![FilterClause::eq_ignore_case(IssuingAgency, "FIRE DEPARTMENT OF NYC")],
        status_rules: vec![
            StatusRule::contains(Status, "DISMISS", Dismissed),
            StatusRule::contains(Status, "PAID", Closed),
            StatusRule::contains(Status, "WRITTEN OFF", Closed),
            StatusRule::contains(Status, "DEFAULT", Active),
            StatusRule::contains(Status, "IN VIOLATION", Active),
            StatusRule::contains(Status, "DOCKET", Active),
            StatusRule::contains(Status, "PENDING", Pending),
            StatusRule::contains(Status, "RESCHEDULE", Pending),
            StatusRule::contains(Status, "NEW", Pending),
        ],
        resolver_rank: None,
    }
}
