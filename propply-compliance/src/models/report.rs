//! Analysis service contract and the final property report

use chrono::{DateTime, Utc};
use propply_common::PropertyIdentifier;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::ComplianceDocument;
use crate::registry::Domain;

/// Payload posted to the external analysis service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub data_type: String,
    pub compliance_data: ComplianceDocument,
    pub property_info: PropertyIdentifier,
    pub request_metadata: RequestMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub version: String,
    pub analysis_type: String,
    pub datasets_included: Vec<Domain>,
}

/// Structured analysis returned by the external service
///
/// The schema belongs to the service; only the presence of the top-level
/// sections is checked before it is passed through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResponse(pub Map<String, Value>);

impl AnalysisResponse {
    pub const REQUIRED_KEYS: [&'static str; 5] = [
        "risk_assessment",
        "priority_actions",
        "financial_impact",
        "equipment_monitoring",
        "regulatory_intelligence",
    ];

    /// Required sections the response lacks
    pub fn missing_keys(&self) -> Vec<&'static str> {
        Self::REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| !self.0.contains_key(*key))
            .collect()
    }
}

/// Compliance document plus narrative analysis, or an explicit marker that
/// the analysis is unavailable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyReport {
    pub report_id: Uuid,
    pub property_info: PropertyIdentifier,
    pub compliance: ComplianceDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResponse>,
    pub analysis_unavailable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_error: Option<String>,
}

impl PropertyReport {
    pub fn with_analysis(compliance: ComplianceDocument, analysis: AnalysisResponse) -> Self {
        Self {
            report_id: Uuid::new_v4(),
            property_info: compliance.property.clone(),
            compliance,
            analysis: Some(analysis),
            analysis_unavailable: false,
            analysis_error: None,
        }
    }

    pub fn without_analysis(compliance: ComplianceDocument, reason: impl Into<String>) -> Self {
        Self {
            report_id: Uuid::new_v4(),
            property_info: compliance.property.clone(),
            compliance,
            analysis: None,
            analysis_unavailable: true,
            analysis_error: Some(reason.into()),
        }
    }
}
