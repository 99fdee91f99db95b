//! Property search by address

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::SearchMatch;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Missing and blank are both rejected with 400
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub zip_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub matches: Vec<SearchMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Message shown when nothing matched
pub fn no_match_message(address: &str) -> String {
    format!("No properties found matching '{}'", address.trim())
}

/// Resolve an address, surfacing upstream failures as 502/504
pub(crate) async fn resolve_matches(state: &AppState, address: &str, zip_code: Option<&str>) -> ApiResult<Vec<SearchMatch>> {
    if address.trim().is_empty() {
        return Err(ApiError::BadRequest("address is required".to_string()));
    }

    match state.resolver.resolve(address, zip_code).await {
        Ok(matches) => Ok(matches),
        Err(err) => {
            state.record_error(err.to_string()).await;
            Err(err.into())
        }
    }
}

/// POST /api/search
pub async fn search(
    State(state): State<AppState>,
    request: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<Json<SearchResponse>> {
    let Json(request) = request?;
    info!(address = %request.address, zip_code = ?request.zip_code, "Property search");

    let matches = resolve_matches(&state, &request.address, request.zip_code.as_deref()).await?;
    let message = matches.is_empty().then(|| no_match_message(&request.address));

    Ok(Json(SearchResponse { matches, message }))
}

pub fn search_routes() -> Router<AppState> {
    Router::new().route("/api/search", post(search))
}
