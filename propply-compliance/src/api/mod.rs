//! HTTP API handlers for propply-compliance

pub mod compliance;
pub mod datasets;
pub mod health;
pub mod report;
pub mod search;

pub use compliance::compliance_routes;
pub use datasets::dataset_routes;
pub use health::health_routes;
pub use report::report_routes;
pub use search::search_routes;
