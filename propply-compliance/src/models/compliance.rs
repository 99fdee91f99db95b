//! Compliance aggregation results

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use propply_common::PropertyIdentifier;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::{Domain, SearchKeyKind, SemanticField};

/// Finite status vocabulary every dataset's free-text status maps into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceStatus {
    Active,
    Closed,
    Dismissed,
    Pending,
    Unknown,
}

impl ComplianceStatus {
    /// Active and pending records count against the domain score
    pub fn is_open(self) -> bool {
        matches!(self, ComplianceStatus::Active | ComplianceStatus::Pending)
    }
}

/// One upstream row mapped onto semantic fields
///
/// Columns the descriptor does not map are dropped; mapped columns missing
/// from the row are simply absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub status: ComplianceStatus,
    pub fields: BTreeMap<SemanticField, Value>,
}

impl NormalizedRecord {
    /// Field value as text, if present and scalar
    pub fn text(&self, field: SemanticField) -> Option<String> {
        match self.fields.get(&field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// Outcome of one search-key attempt against a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Records { count: usize },
    Empty,
    Rejected { status_code: u16 },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchAttempt {
    pub key: SearchKeyKind,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Per-domain outcome of one aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetResult {
    pub domain: Domain,
    pub dataset_id: String,
    pub dataset_name: String,
    pub count: usize,
    pub records: Vec<NormalizedRecord>,
    /// Key kind that produced `records`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_key: Option<SearchKeyKind>,
    #[serde(default)]
    pub attempts: Vec<SearchAttempt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DatasetResult {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Records whose status counts against the score
    pub fn active_count(&self) -> usize {
        self.records.iter().filter(|r| r.status.is_open()).count()
    }

    pub fn status_counts(&self) -> BTreeMap<ComplianceStatus, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.status).or_insert(0) += 1;
        }
        counts
    }
}

/// Counts and score for one domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSummary {
    pub total: usize,
    pub active: usize,
    pub by_status: BTreeMap<ComplianceStatus, usize>,
    /// `None` when the domain failed and was left out of the overall score
    pub score: Option<f64>,
}

/// Aggregated compliance picture for one property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceDocument {
    pub property: PropertyIdentifier,
    pub results: BTreeMap<Domain, DatasetResult>,
    pub summary: BTreeMap<Domain, DomainSummary>,
    pub overall_score: Option<f64>,
    pub generated_at: DateTime<Utc>,
}

impl ComplianceDocument {
    /// Domains whose fetch succeeded
    pub fn domains_with_data(&self) -> Vec<Domain> {
        self.results
            .values()
            .filter(|r| !r.is_failed())
            .map(|r| r.domain)
            .collect()
    }
}
