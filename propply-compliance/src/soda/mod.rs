//! SODA Query Client
//!
//! Generic client for NYC Open Data (Socrata). Callers describe filters in
//! semantic terms; the client translates them through the dataset
//! descriptor, pages through results and applies the retry policy.
//!
//! # Retry policy
//! | Error                         | Attempt 0          | Attempt 1+ |
//! |-------------------------------|--------------------|------------|
//! | Timeout, connection failure   | retry after backoff | surface   |
//! | HTTP 5xx, HTTP 429            | retry after backoff | surface   |
//! | HTTP 4xx                      | surface            | surface    |
//! | Malformed body, unmapped field | surface           | surface    |
//!
//! A 4xx means the query itself is wrong for the dataset; choosing another
//! search key is the caller's job.

pub mod query;
pub mod transport;

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

pub use query::{FilterClause, FilterOp, SodaQuery};
pub use transport::{HttpTransport, RawRecord, SodaCredentials, SodaTransport};

use crate::registry::{DatasetDescriptor, SemanticField};

/// SODA client errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SodaError {
    /// Non-2xx response
    #[error("Dataset {dataset_id} returned HTTP {status_code}: {message}")]
    UpstreamRequest {
        status_code: u16,
        dataset_id: String,
        message: String,
    },

    #[error("Dataset {dataset_id} timed out")]
    UpstreamTimeout { dataset_id: String },

    /// Connection refused, DNS failure, reset
    #[error("Dataset {dataset_id} unreachable: {message}")]
    Unavailable { dataset_id: String, message: String },

    #[error("Dataset {dataset_id} returned malformed data: {detail}")]
    MalformedResponse { dataset_id: String, detail: String },

    /// The query names a field the dataset has no column for
    #[error("Dataset {dataset_id} has no column for {field}")]
    UnmappedField {
        dataset_id: String,
        field: SemanticField,
    },
}

impl SodaError {
    /// HTTP status for upstream rejections
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SodaError::UpstreamRequest { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// 4xx other than 429: the query is wrong for this dataset
    pub fn is_client_error(&self) -> bool {
        matches!(self.status_code(), Some(code) if (400..500).contains(&code) && code != 429)
    }

    /// Transient failures worth one more try
    pub fn is_transient(&self) -> bool {
        match self {
            SodaError::UpstreamTimeout { .. } | SodaError::Unavailable { .. } => true,
            SodaError::UpstreamRequest { status_code, .. } => *status_code >= 500 || *status_code == 429,
            SodaError::MalformedResponse { .. } | SodaError::UnmappedField { .. } => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SodaError::UpstreamTimeout { .. })
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { backoff: Duration },
    Surface,
}

/// Fixed-backoff retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn with_backoff(backoff: Duration) -> Self {
        Self {
            backoff,
            ..Self::default()
        }
    }

    /// Decision for a failure on `attempt` (0 = first try)
    pub fn decide(&self, err: &SodaError, attempt: u32) -> RetryDecision {
        if err.is_transient() && attempt < self.max_retries {
            RetryDecision::Retry {
                backoff: self.backoff,
            }
        } else {
            RetryDecision::Surface
        }
    }
}

/// Paging, retrying SODA client
///
/// Holds no per-request state, so one instance serves concurrent fetches.
#[derive(Clone)]
pub struct SodaClient {
    transport: Arc<dyn SodaTransport>,
    retry: RetryPolicy,
}

impl SodaClient {
    pub fn new(transport: Arc<dyn SodaTransport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    /// Fetch one page
    ///
    /// `limit == 0` uses the descriptor's default page size; an empty
    /// `select` uses the descriptor's default field list.
    pub async fn fetch(
        &self,
        descriptor: &DatasetDescriptor,
        filters: &[FilterClause],
        select: &[SemanticField],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RawRecord>, SodaError> {
        let query = SodaQuery {
            filters: filters.to_vec(),
            select: select.to_vec(),
            limit,
            offset,
        };
        let params = query::build_params(descriptor, &query)?;

        let mut attempt = 0;
        loop {
            let started = Instant::now();
            match self.transport.get(descriptor.dataset_id, &params).await {
                Ok(rows) => {
                    debug!(
                        dataset_id = descriptor.dataset_id,
                        rows = rows.len(),
                        offset,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "SODA page fetched"
                    );
                    return Ok(rows);
                }
                Err(err) => match self.retry.decide(&err, attempt) {
                    RetryDecision::Retry { backoff } => {
                        warn!(
                            dataset_id = descriptor.dataset_id,
                            attempt,
                            error = %err,
                            backoff_ms = backoff.as_millis() as u64,
                            "SODA request failed, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                    }
                    RetryDecision::Surface => return Err(err),
                },
            }
        }
    }

    /// Fetch every page, stopping at a short page or at `max_records`
    ///
    /// Page size is the descriptor's default, shrunk on the last page so no
    /// more than `max_records` rows are ever requested.
    pub async fn fetch_all(
        &self,
        descriptor: &DatasetDescriptor,
        filters: &[FilterClause],
        max_records: Option<usize>,
    ) -> Result<Vec<RawRecord>, SodaError> {
        let page_size = descriptor.default_limit.max(1);
        let mut records = Vec::new();
        let mut offset = 0;

        loop {
            let limit = match max_records {
                Some(cap) => page_size.min(cap.saturating_sub(records.len())),
                None => page_size,
            };
            if limit == 0 {
                break;
            }

            let page = self.fetch(descriptor, filters, &[], limit, offset).await?;
            let received = page.len();
            records.extend(page);

            if received < limit {
                break;
            }
            offset += received;
        }

        Ok(records)
    }
}
