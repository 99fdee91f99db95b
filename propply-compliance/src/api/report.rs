//! End-to-end property analysis: resolve, aggregate, analyze

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::compliance::ComplianceView;
use super::search::{no_match_message, resolve_matches};
use crate::analysis::assemble_report;
use crate::models::{AnalysisResponse, PropertyReport, SearchMatch};
use crate::registry::Domain;
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub zip_code: Option<String>,
}

/// Report as returned to the presentation layer
#[derive(Debug, Serialize)]
pub struct ReportView {
    pub report_id: Uuid,
    #[serde(flatten)]
    pub compliance: ComplianceView,
    pub analysis: Option<AnalysisResponse>,
    pub analysis_unavailable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_error: Option<String>,
}

impl ReportView {
    pub fn from_report(report: PropertyReport, sample_size: usize) -> Self {
        Self {
            report_id: report.report_id,
            compliance: ComplianceView::from_document(&report.compliance, sample_size),
            analysis: report.analysis,
            analysis_unavailable: report.analysis_unavailable,
            analysis_error: report.analysis_error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub report: Option<ReportView>,
    pub matches: Vec<SearchMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// POST /api/analyze-property
///
/// Uses the best-ranked match. No match is a 200 with `report: null`.
pub async fn analyze_property(
    State(state): State<AppState>,
    request: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let Json(request) = request?;
    info!(address = %request.address, zip_code = ?request.zip_code, "Property analysis requested");

    let matches = resolve_matches(&state, &request.address, request.zip_code.as_deref()).await?;
    if matches.is_empty() {
        return Ok(Json(AnalyzeResponse {
            report: None,
            matches,
            message: Some(no_match_message(&request.address)),
        }));
    }

    let mut identifier = matches[0].identifier.clone();
    if identifier.zip_code.is_none() {
        identifier.zip_code = request.zip_code.clone();
    }

    let document = state
        .aggregator
        .aggregate(&identifier, &Domain::selection(state.settings.include_fdny))
        .await;
    let report = assemble_report(document, state.analysis.as_ref()).await;

    info!(
        report_id = %report.report_id,
        analysis_unavailable = report.analysis_unavailable,
        "Property report assembled"
    );

    Ok(Json(AnalyzeResponse {
        report: Some(ReportView::from_report(report, state.settings.sample_size)),
        matches,
        message: None,
    }))
}

pub fn report_routes() -> Router<AppState> {
    Router::new().route("/api/analyze-property", post(analyze_property))
}
