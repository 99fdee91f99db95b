//! HTTP client for the external analysis webhook

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{AnalysisError, AnalysisService};
use crate::models::{AnalysisRequest, AnalysisResponse};

/// Posts the analysis request as JSON and validates the returned sections
pub struct AnalysisClient {
    http_client: Client,
    url: String,
    timeout: Duration,
    /// Completion time beyond which a slow success is logged
    expected: Duration,
}

impl AnalysisClient {
    pub fn new(url: impl Into<String>, timeout: Duration, expected: Duration) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .user_agent(concat!("propply-compliance/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            url: url.into(),
            timeout,
            expected,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Extract the analysis object from the webhook body
///
/// Accepts `[{"output": {...}}]`, `{"output": {...}}` or the bare object.
pub fn unwrap_output(body: Value) -> Result<AnalysisResponse, AnalysisError> {
    let value = match body {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    };
    let value = match value {
        Value::Object(mut map) if map.contains_key("output") => map.remove("output").unwrap_or(Value::Null),
        other => other,
    };

    let response = match value {
        Value::Object(map) => AnalysisResponse(map),
        other => {
            return Err(AnalysisError::Unavailable(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    let missing = response.missing_keys();
    if missing.is_empty() {
        Ok(response)
    } else {
        Err(AnalysisError::MissingKeys(
            missing.into_iter().map(str::to_string).collect(),
        ))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl AnalysisService for AnalysisClient {
    async fn submit(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, AnalysisError> {
        let started = Instant::now();
        debug!(url = %self.url, "Submitting analysis request");

        let response = self
            .http_client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Unavailable(format!("HTTP {}", status.as_u16())));
        }

        let body: Value = response.json().await.map_err(|e| self.classify(e))?;
        let analysis = unwrap_output(body)?;

        let elapsed = started.elapsed();
        if elapsed > self.expected {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                expected_ms = self.expected.as_millis() as u64,
                "Analysis service slower than expected"
            );
        } else {
            info!(elapsed_ms = elapsed.as_millis() as u64, "Analysis received");
        }
        Ok(analysis)
    }
}

impl AnalysisClient {
    fn classify(&self, err: reqwest::Error) -> AnalysisError {
        if err.is_timeout() {
            AnalysisError::Timeout(self.timeout)
        } else {
            AnalysisError::Unavailable(err.to_string())
        }
    }
}
