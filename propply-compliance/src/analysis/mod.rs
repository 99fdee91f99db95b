//! Report Assembler / External-Analysis Bridge
//!
//! Builds the payload for the external analysis service, submits it, and
//! assembles the final [`PropertyReport`]. A failed or slow analysis never
//! fails the report: the compliance document is returned with
//! `analysis_unavailable` set.

pub mod client;

use std::time::Duration;

use async_trait::async_trait;
use propply_common::PropertyIdentifier;
use thiserror::Error;
use tracing::{info, warn};

pub use client::AnalysisClient;

use crate::models::{AnalysisRequest, AnalysisResponse, ComplianceDocument, PropertyReport, RequestMetadata};

/// `source` field of every analysis request
pub const REQUEST_SOURCE: &str = "propply-compliance";
pub const REQUEST_DATA_TYPE: &str = "nyc_property_compliance";
pub const ANALYSIS_TYPE: &str = "comprehensive_compliance_analysis";
/// Reason recorded when no analysis URL is configured
pub const NOT_CONFIGURED: &str = "analysis service not configured";

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Connection failure, non-2xx, unparseable body
    #[error("Analysis service unavailable: {0}")]
    Unavailable(String),

    #[error("Analysis service timed out after {0:?}")]
    Timeout(Duration),

    #[error("Analysis response missing sections: {}", .0.join(", "))]
    MissingKeys(Vec<String>),
}

/// External narrative-analysis service
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn submit(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, AnalysisError>;

    /// False when submitting can never succeed (no endpoint configured)
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Stand-in used when no analysis URL is configured
pub struct DisabledAnalysis;

#[async_trait]
impl AnalysisService for DisabledAnalysis {
    async fn submit(&self, _request: &AnalysisRequest) -> Result<AnalysisResponse, AnalysisError> {
        Err(AnalysisError::Unavailable(NOT_CONFIGURED.to_string()))
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Analysis payload for a compliance document
///
/// Pure: the timestamp is the document's own `generated_at`, so the same
/// inputs always build the same request.
pub fn build_analysis_request(document: &ComplianceDocument, identifier: &PropertyIdentifier) -> AnalysisRequest {
    AnalysisRequest {
        timestamp: document.generated_at,
        source: REQUEST_SOURCE.to_string(),
        data_type: REQUEST_DATA_TYPE.to_string(),
        compliance_data: document.clone(),
        property_info: identifier.clone(),
        request_metadata: RequestMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            analysis_type: ANALYSIS_TYPE.to_string(),
            datasets_included: document.domains_with_data(),
        },
    }
}

/// Submit the document for analysis and assemble the report
pub async fn assemble_report(document: ComplianceDocument, service: &dyn AnalysisService) -> PropertyReport {
    if !service.is_enabled() {
        return PropertyReport::without_analysis(document, NOT_CONFIGURED);
    }

    let request = build_analysis_request(&document, &document.property);
    match service.submit(&request).await {
        Ok(analysis) => {
            info!(bin = ?document.property.bin, "Analysis attached to report");
            PropertyReport::with_analysis(document, analysis)
        }
        Err(err) => {
            warn!(error = %err, "Analysis unavailable, returning compliance data only");
            PropertyReport::without_analysis(document, err.to_string())
        }
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use serde_json::{json, Map, Value};
    use std::sync::Mutex;

    /// Scripted analysis service that records what it was sent
    pub struct MockAnalysis {
        pub response: Option<Map<String, Value>>,
        pub received: Mutex<Vec<AnalysisRequest>>,
    }

    impl MockAnalysis {
        pub fn complete() -> Self {
            let response = AnalysisResponse::REQUIRED_KEYS
                .iter()
                .map(|key| (key.to_string(), json!({})))
                .collect();
            Self {
                response: Some(response),
                received: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                response: None,
                received: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AnalysisService for MockAnalysis {
        async fn submit(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, AnalysisError> {
            self.received.lock().unwrap().push(request.clone());
            match &self.response {
                Some(map) => Ok(AnalysisResponse(map.clone())),
                None => Err(AnalysisError::Timeout(Duration::from_secs(120))),
            }
        }
    }
}
