//! Record normalization into the shared status vocabulary

use std::collections::BTreeMap;

use crate::models::{ComplianceStatus, NormalizedRecord};
use crate::registry::DatasetDescriptor;
use crate::soda::RawRecord;

/// Evaluate the descriptor's status rules in order; first match wins
pub fn classify(descriptor: &DatasetDescriptor, row: &RawRecord) -> ComplianceStatus {
    descriptor
        .status_rules
        .iter()
        .find(|rule| rule.matches(descriptor.text(row, rule.field).as_deref()))
        .map(|rule| rule.status)
        .unwrap_or(ComplianceStatus::Unknown)
}

/// Map a raw row onto semantic fields and attach its status
///
/// Unmapped columns are dropped; mapped columns absent from the row stay absent.
pub fn normalize_record(descriptor: &DatasetDescriptor, row: &RawRecord) -> NormalizedRecord {
    let fields = descriptor
        .columns
        .iter()
        .filter_map(|(field, column)| row.get(*column).map(|value| (*field, value.clone())))
        .collect::<BTreeMap<_, _>>();

    NormalizedRecord {
        status: classify(descriptor, row),
        fields,
    }
}
