//! Compliance aggregation for a known identifier

use std::collections::BTreeMap;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use propply_common::{Borough, PropertyIdentifier};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::{ComplianceDocument, DomainSummary, NormalizedRecord, SearchAttempt};
use crate::registry::{Domain, SearchKeyKind};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ComplianceRequest {
    #[serde(default)]
    pub bin: Option<String>,
    #[serde(default)]
    pub bbl: Option<String>,
    /// Code ("1"), name ("MANHATTAN") or abbreviation ("MN")
    #[serde(default)]
    pub borough: Option<String>,
    #[serde(default)]
    pub block: Option<String>,
    #[serde(default)]
    pub lot: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    /// Overrides the configured default
    #[serde(default)]
    pub include_fdny: Option<bool>,
}

impl ComplianceRequest {
    /// Validated, canonical identifier; 400 when nothing searchable remains
    pub fn identifier(&self) -> ApiResult<PropertyIdentifier> {
        let borough = match self.borough.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            Some(borough) => Some(borough.parse::<Borough>()?),
            None => None,
        };

        let identifier = PropertyIdentifier {
            address: self.address.clone(),
            bin: self.bin.clone(),
            bbl: self.bbl.clone(),
            borough,
            block: self.block.clone(),
            lot: self.lot.clone(),
            zip_code: self.zip_code.clone(),
        }
        .normalized()?;

        if !identifier.is_searchable() {
            return Err(ApiError::BadRequest(
                "Provide a BIN, a BBL, borough with block and lot, or an address".to_string(),
            ));
        }
        Ok(identifier)
    }
}

/// One domain as returned to the presentation layer
#[derive(Debug, Serialize)]
pub struct DomainView {
    pub dataset_id: String,
    pub dataset_name: String,
    pub count: usize,
    pub sample_records: Vec<NormalizedRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_key: Option<SearchKeyKind>,
    pub attempts: Vec<SearchAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Compliance document with records trimmed to a sample per domain
#[derive(Debug, Serialize)]
pub struct ComplianceView {
    pub property_info: PropertyIdentifier,
    pub compliance_data: BTreeMap<Domain, DomainView>,
    pub summary: BTreeMap<Domain, DomainSummary>,
    pub overall_score: Option<f64>,
    pub generated_at: DateTime<Utc>,
}

impl ComplianceView {
    pub fn from_document(document: &ComplianceDocument, sample_size: usize) -> Self {
        let compliance_data = document
            .results
            .iter()
            .map(|(domain, result)| {
                let view = DomainView {
                    dataset_id: result.dataset_id.clone(),
                    dataset_name: result.dataset_name.clone(),
                    count: result.count,
                    sample_records: result.records.iter().take(sample_size).cloned().collect(),
                    search_key: result.search_key,
                    attempts: result.attempts.clone(),
                    error: result.error.clone(),
                };
                (*domain, view)
            })
            .collect();

        Self {
            property_info: document.property.clone(),
            compliance_data,
            summary: document.summary.clone(),
            overall_score: document.overall_score,
            generated_at: document.generated_at,
        }
    }
}

/// POST /api/compliance
pub async fn compliance(
    State(state): State<AppState>,
    request: Result<Json<ComplianceRequest>, JsonRejection>,
) -> ApiResult<Json<ComplianceView>> {
    let Json(request) = request?;
    let identifier = request.identifier()?;
    let include_fdny = request.include_fdny.unwrap_or(state.settings.include_fdny);

    info!(bin = ?identifier.bin, bbl = ?identifier.effective_bbl(), include_fdny, "Compliance lookup");

    let document = state
        .aggregator
        .aggregate(&identifier, &Domain::selection(include_fdny))
        .await;

    Ok(Json(ComplianceView::from_document(&document, state.settings.sample_size)))
}

pub fn compliance_routes() -> Router<AppState> {
    Router::new().route("/api/compliance", post(compliance))
}
