//! propply-compliance library interface
//!
//! NYC property compliance lookup: resolves an address to building
//! identifiers, aggregates violation/inspection/permit records from NYC Open
//! Data and hands the result to an external analysis service.

pub mod address;
pub mod aggregator;
pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod registry;
pub mod resolver;
pub mod soda;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::aggregator::Aggregator;
use crate::analysis::AnalysisService;
use crate::registry::DatasetRegistry;
use crate::resolver::Resolver;

/// Per-request defaults taken from configuration
#[derive(Debug, Clone, Copy)]
pub struct RequestSettings {
    /// Normalized records echoed per domain in compliance responses
    pub sample_size: usize,
    /// Query FDNY violations unless the request opts out
    pub include_fdny: bool,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            sample_size: 10,
            include_fdny: true,
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DatasetRegistry>,
    pub resolver: Arc<Resolver>,
    pub aggregator: Arc<Aggregator>,
    pub analysis: Arc<dyn AnalysisService>,
    pub settings: RequestSettings,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last upstream error, for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        registry: Arc<DatasetRegistry>,
        resolver: Arc<Resolver>,
        aggregator: Arc<Aggregator>,
        analysis: Arc<dyn AnalysisService>,
        settings: RequestSettings,
    ) -> Self {
        Self {
            registry,
            resolver,
            aggregator,
            analysis,
            settings,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember an upstream failure for `/health`
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::dataset_routes())
        .merge(api::search_routes())
        .merge(api::compliance_routes())
        .merge(api::report_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
