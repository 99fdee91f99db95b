//! Compliance Aggregator
//!
//! Fetches every requested domain for one property and folds the results
//! into a [`ComplianceDocument`].
//!
//! # Per-domain flow
//! 1. Form candidate search keys (BIN > BBL > BOROUGH_BLOCK_LOT > ADDRESS),
//!    restricted to what the dataset supports.
//! 2. Walk the candidates through [`next_transition`] until one finishes or
//!    fails.
//! 3. Normalize the accepted rows and score the domain.
//!
//! Domains run concurrently. A failing domain only fills in its own `error`;
//! the document is always returned.

pub mod scoring;
pub mod search_key;
pub mod status;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use propply_common::PropertyIdentifier;
use tracing::{debug, info, warn};

use crate::models::{AttemptOutcome, ComplianceDocument, DatasetResult, SearchAttempt};
use crate::registry::{DatasetRegistry, Domain};
use crate::soda::{RawRecord, SodaClient, SodaError};

pub use scoring::ScoringPolicy;
pub use search_key::{candidate_keys, unsearchable_reason, SearchKey};
pub use status::{classify, normalize_record};

/// What one search key produced
#[derive(Debug)]
pub enum KeyOutcome {
    /// Accepted rows, at least one
    Found(Vec<RawRecord>),
    Empty,
    /// 4xx: the query shape is wrong for this dataset
    Rejected(SodaError),
    /// The identifier's values cannot be written in this dataset's encoding
    Unencodable(String),
    /// Timeout, 5xx after retry, malformed body
    Failed(SodaError),
}

impl KeyOutcome {
    fn from_fetch(fetched: Result<Vec<RawRecord>, SodaError>) -> Self {
        match fetched {
            Ok(rows) if rows.is_empty() => KeyOutcome::Empty,
            Ok(rows) => KeyOutcome::Found(rows),
            Err(err) if err.is_client_error() => KeyOutcome::Rejected(err),
            Err(err) => KeyOutcome::Failed(err),
        }
    }

    fn attempt(&self) -> AttemptOutcome {
        match self {
            KeyOutcome::Found(rows) => AttemptOutcome::Records { count: rows.len() },
            KeyOutcome::Empty => AttemptOutcome::Empty,
            KeyOutcome::Rejected(err) => AttemptOutcome::Rejected {
                status_code: err.status_code().unwrap_or_default(),
            },
            KeyOutcome::Unencodable(message) => AttemptOutcome::Failed {
                message: message.clone(),
            },
            KeyOutcome::Failed(err) => AttemptOutcome::Failed {
                message: err.to_string(),
            },
        }
    }
}

/// Step after one search key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Keep this key's rows (possibly none)
    Finish,
    TryNext,
    Fail,
}

/// Fallback decision table
///
/// | Outcome     | More keys                       | Last key |
/// |-------------|---------------------------------|----------|
/// | Found       | Finish                          | Finish   |
/// | Empty       | TryNext if fallback on empty    | Finish   |
/// | Rejected    | TryNext                         | Fail     |
/// | Unencodable | TryNext                         | Fail     |
/// | Failed      | Fail                            | Fail     |
pub fn next_transition(outcome: &KeyOutcome, is_last: bool, fallback_on_empty: bool) -> Transition {
    match outcome {
        KeyOutcome::Found(_) => Transition::Finish,
        KeyOutcome::Empty if fallback_on_empty && !is_last => Transition::TryNext,
        KeyOutcome::Empty => Transition::Finish,
        KeyOutcome::Rejected(_) | KeyOutcome::Unencodable(_) if !is_last => Transition::TryNext,
        KeyOutcome::Rejected(_) | KeyOutcome::Unencodable(_) => Transition::Fail,
        KeyOutcome::Failed(_) => Transition::Fail,
    }
}

#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    /// Cap on rows fetched per domain
    pub max_records_per_domain: usize,
    /// Move to the next key when a key returns zero rows
    pub fallback_on_empty: bool,
    pub scoring: ScoringPolicy,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            max_records_per_domain: 1000,
            fallback_on_empty: true,
            scoring: ScoringPolicy::default(),
        }
    }
}

pub struct Aggregator {
    client: SodaClient,
    registry: Arc<DatasetRegistry>,
    settings: AggregatorSettings,
}

impl Aggregator {
    pub fn new(client: SodaClient, registry: Arc<DatasetRegistry>) -> Self {
        Self::with_settings(client, registry, AggregatorSettings::default())
    }

    pub fn with_settings(client: SodaClient, registry: Arc<DatasetRegistry>, settings: AggregatorSettings) -> Self {
        Self {
            client,
            registry,
            settings,
        }
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    /// Aggregate the given domains for one property
    ///
    /// Never fails: per-domain problems land in that domain's `error`.
    pub async fn aggregate(&self, identifier: &PropertyIdentifier, domains: &[Domain]) -> ComplianceDocument {
        let started = Instant::now();
        let domains: BTreeSet<Domain> = domains.iter().copied().collect();

        info!(
            bin = ?identifier.bin,
            bbl = ?identifier.effective_bbl(),
            domains = domains.len(),
            "Aggregating compliance data"
        );

        let futures = domains
            .iter()
            .map(|domain| self.aggregate_domain(identifier, *domain));
        let results: BTreeMap<Domain, DatasetResult> = join_all(futures)
            .await
            .into_iter()
            .map(|result| (result.domain, result))
            .collect();

        let summary = results
            .iter()
            .map(|(domain, result)| (*domain, self.settings.scoring.summarize(result)))
            .collect();
        let overall_score = self.settings.scoring.overall(&summary);

        let failed = results.values().filter(|r| r.is_failed()).count();
        info!(
            domains = results.len(),
            failed,
            overall_score = ?overall_score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Aggregation complete"
        );

        ComplianceDocument {
            property: identifier.clone(),
            results,
            summary,
            overall_score,
            generated_at: Utc::now(),
        }
    }

    async fn aggregate_domain(&self, identifier: &PropertyIdentifier, domain: Domain) -> DatasetResult {
        let mut result = DatasetResult {
            domain,
            dataset_id: String::new(),
            dataset_name: String::new(),
            count: 0,
            records: Vec::new(),
            search_key: None,
            attempts: Vec::new(),
            error: None,
        };

        let descriptor = match self.registry.descriptor_for_domain(domain) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                warn!(domain = %domain, error = %err, "Domain has no dataset");
                result.error = Some(err.to_string());
                return result;
            }
        };
        result.dataset_id = descriptor.dataset_id.to_string();
        result.dataset_name = descriptor.name.to_string();

        let candidates = candidate_keys(descriptor, identifier);
        if candidates.is_empty() {
            let reason = unsearchable_reason(descriptor, identifier);
            warn!(domain = %domain, reason = %reason, "No usable search key");
            result.error = Some(reason);
            return result;
        }

        let last = candidates.len() - 1;
        for (index, key) in candidates.iter().enumerate() {
            let kind = key.kind();
            let outcome = match key.filters(descriptor) {
                Some(filters) => {
                    let fetched = self
                        .client
                        .fetch_all(descriptor, &filters, Some(self.settings.max_records_per_domain))
                        .await
                        .map(|rows| {
                            rows.into_iter()
                                .filter(|row| key.accepts(descriptor, row))
                                .collect::<Vec<_>>()
                        });
                    KeyOutcome::from_fetch(fetched)
                }
                None => KeyOutcome::Unencodable(format!("{} values cannot be encoded for {}", kind, descriptor.name)),
            };

            result.attempts.push(SearchAttempt {
                key: kind,
                outcome: outcome.attempt(),
            });

            match next_transition(&outcome, index == last, self.settings.fallback_on_empty) {
                Transition::TryNext => {
                    debug!(domain = %domain, key = %kind, outcome = ?result.attempts.last(), "Falling back to next search key");
                }
                Transition::Finish => {
                    let rows = match outcome {
                        KeyOutcome::Found(rows) => rows,
                        _ => Vec::new(),
                    };
                    result.search_key = Some(kind);
                    result.records = rows.iter().map(|row| normalize_record(descriptor, row)).collect();
                    result.count = result.records.len();
                    debug!(domain = %domain, key = %kind, count = result.count, "Domain fetched");
                    return result;
                }
                Transition::Fail => {
                    let message = match outcome {
                        KeyOutcome::Rejected(err) | KeyOutcome::Failed(err) => err.to_string(),
                        KeyOutcome::Unencodable(message) => message,
                        KeyOutcome::Found(_) | KeyOutcome::Empty => String::from("unexpected fetch outcome"),
                    };
                    warn!(domain = %domain, key = %kind, error = %message, "Domain fetch failed");
                    result.error = Some(message);
                    return result;
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected() -> KeyOutcome {
        KeyOutcome::Rejected(SodaError::UpstreamRequest {
            status_code: 400,
            dataset_id: "x".to_string(),
            message: "bad column".to_string(),
        })
    }

    fn timeout() -> KeyOutcome {
        KeyOutcome::Failed(SodaError::UpstreamTimeout {
            dataset_id: "x".to_string(),
        })
    }

    #[test]
    fn test_transition_table() {
        let found = KeyOutcome::Found(vec![RawRecord::new()]);
        assert_eq!(next_transition(&found, false, true), Transition::Finish);
        assert_eq!(next_transition(&found, true, true), Transition::Finish);

        assert_eq!(next_transition(&KeyOutcome::Empty, false, true), Transition::TryNext);
        assert_eq!(next_transition(&KeyOutcome::Empty, false, false), Transition::Finish);
        assert_eq!(next_transition(&KeyOutcome::Empty, true, true), Transition::Finish);

        assert_eq!(next_transition(&rejected(), false, true), Transition::TryNext);
        assert_eq!(next_transition(&rejected(), true, true), Transition::Fail);

        assert_eq!(next_transition(&timeout(), false, true), Transition::Fail);
        assert_eq!(next_transition(&timeout(), true, true), Transition::Fail);
    }

    #[test]
    fn test_attempt_outcome_recording() {
        assert_eq!(rejected().attempt(), AttemptOutcome::Rejected { status_code: 400 });
        assert_eq!(
            KeyOutcome::Found(vec![RawRecord::new(), RawRecord::new()]).attempt(),
            AttemptOutcome::Records { count: 2 }
        );
        assert!(matches!(timeout().attempt(), AttemptOutcome::Failed { .. }));
    }

    #[test]
    fn test_fetch_classification() {
        assert!(matches!(KeyOutcome::from_fetch(Ok(Vec::new())), KeyOutcome::Empty));
        let server_error = SodaError::UpstreamRequest {
            status_code: 503,
            dataset_id: "x".to_string(),
            message: String::new(),
        };
        assert!(matches!(KeyOutcome::from_fetch(Err(server_error)), KeyOutcome::Failed(_)));
    }
}
