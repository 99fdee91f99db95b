//! Data models shared across the service

pub mod compliance;
pub mod report;
pub mod search;

pub use compliance::{
    AttemptOutcome, ComplianceDocument, ComplianceStatus, DatasetResult, DomainSummary,
    NormalizedRecord, SearchAttempt,
};
pub use report::{AnalysisRequest, AnalysisResponse, PropertyReport, RequestMetadata};
pub use search::{MatchConfidence, MatchStrategy, SearchMatch};
