//! Dataset registry listing

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::registry::{BoroughFormat, DatasetDescriptor, Domain, SearchKeyKind};
use crate::AppState;

/// One registered dataset as exposed over HTTP
#[derive(Debug, Serialize)]
pub struct DatasetInfo {
    pub key: &'static str,
    pub dataset_id: &'static str,
    pub name: &'static str,
    /// Compliance domain backed by this dataset; absent for resolver-only datasets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    pub search_keys: Vec<SearchKeyKind>,
    pub borough_format: BoroughFormat,
    pub block_width: Option<usize>,
    pub lot_width: Option<usize>,
    pub page_size: usize,
    pub used_for_resolution: bool,
}

impl From<&DatasetDescriptor> for DatasetInfo {
    fn from(descriptor: &DatasetDescriptor) -> Self {
        Self {
            key: descriptor.key,
            dataset_id: descriptor.dataset_id,
            name: descriptor.name,
            domain: Domain::ALL.into_iter().find(|d| d.as_str() == descriptor.key),
            search_keys: descriptor.search_keys.clone(),
            borough_format: descriptor.borough_format,
            block_width: descriptor.block_width,
            lot_width: descriptor.lot_width,
            page_size: descriptor.default_limit,
            used_for_resolution: descriptor.resolver_rank.is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DatasetsResponse {
    pub datasets: Vec<DatasetInfo>,
}

/// GET /api/datasets
pub async fn list_datasets(State(state): State<AppState>) -> Json<DatasetsResponse> {
    Json(DatasetsResponse {
        datasets: state.registry.descriptors().map(DatasetInfo::from).collect(),
    })
}

pub fn dataset_routes() -> Router<AppState> {
    Router::new().route("/api/datasets", get(list_datasets))
}
