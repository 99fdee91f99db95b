//! HTTP transport for the Socrata Open Data API
//!
//! One GET per page against `{base_url}/{dataset_id}.json`. The transport
//! classifies failures; deciding whether to retry belongs to the client.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use tracing::debug;

use super::SodaError;

/// One upstream row as returned by SODA
pub type RawRecord = Map<String, Value>;

/// Executes one SODA request
#[async_trait]
pub trait SodaTransport: Send + Sync {
    async fn get(&self, dataset_id: &str, params: &[(String, String)]) -> Result<Vec<RawRecord>, SodaError>;
}

/// Optional SODA credentials; an empty set means anonymous access
#[derive(Debug, Clone, Default)]
pub struct SodaCredentials {
    /// Sent as `X-App-Token`
    pub app_token: Option<String>,
    /// HTTP basic auth (key id, key secret)
    pub api_key: Option<(String, String)>,
}

impl SodaCredentials {
    pub fn is_anonymous(&self) -> bool {
        self.app_token.is_none() && self.api_key.is_none()
    }
}

/// reqwest-backed transport with client-side rate limiting
pub struct HttpTransport {
    client: Client,
    base_url: String,
    credentials: SodaCredentials,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        credentials: SodaCredentials,
        timeout: Duration,
        requests_per_second: NonZeroU32,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("propply-compliance/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            rate_limiter: RateLimiter::direct(Quota::per_second(requests_per_second)),
        })
    }

    fn classify(dataset_id: &str, err: reqwest::Error) -> SodaError {
        if err.is_timeout() {
            SodaError::UpstreamTimeout {
                dataset_id: dataset_id.to_string(),
            }
        } else {
            SodaError::Unavailable {
                dataset_id: dataset_id.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl SodaTransport for HttpTransport {
    async fn get(&self, dataset_id: &str, params: &[(String, String)]) -> Result<Vec<RawRecord>, SodaError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/{}.json", self.base_url, dataset_id);
        debug!(dataset_id, url = %url, ?params, "SODA request");

        let mut request = self.client.get(&url).query(params);
        if let Some(token) = &self.credentials.app_token {
            request = request.header("X-App-Token", token);
        }
        if let Some((key_id, key_secret)) = &self.credentials.api_key {
            request = request.basic_auth(key_id, Some(key_secret));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::classify(dataset_id, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Self::classify(dataset_id, e))?;

        if !status.is_success() {
            return Err(SodaError::UpstreamRequest {
                status_code: status.as_u16(),
                dataset_id: dataset_id.to_string(),
                message: upstream_message(status, &body),
            });
        }

        parse_rows(dataset_id, &body)
    }
}

/// Parse a SODA JSON body into rows
pub fn parse_rows(dataset_id: &str, body: &str) -> Result<Vec<RawRecord>, SodaError> {
    let value: Value = serde_json::from_str(body).map_err(|e| SodaError::MalformedResponse {
        dataset_id: dataset_id.to_string(),
        detail: format!("invalid JSON: {}", e),
    })?;

    let Value::Array(items) = value else {
        return Err(SodaError::MalformedResponse {
            dataset_id: dataset_id.to_string(),
            detail: "expected a JSON array of rows".to_string(),
        });
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(row) => Ok(row),
            other => Err(SodaError::MalformedResponse {
                dataset_id: dataset_id.to_string(),
                detail: format!("expected row object, got {}", other),
            }),
        })
        .collect()
}

/// SODA error bodies look like `{"error": true, "message": "..."}`
fn upstream_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        })
}
