//! Shared test utilities
//!
//! - `ScriptedTransport`: in-memory SODA transport with per-dataset response
//!   queues that records every request it receives
//! - `FilteringTransport`: in-memory datasets answered by evaluating the
//!   `$where` clause the client sends
//! - fixtures for the 140 West 28th Street property
//! - `spawn_stub`: serve an axum router on a loopback port

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use propply_common::{Borough, PropertyIdentifier};
use propply_compliance::registry::DatasetRegistry;
use propply_compliance::soda::{RawRecord, RetryPolicy, SodaClient, SodaError, SodaTransport};
use serde_json::Value;

/// One request seen by the scripted transport
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub dataset_id: String,
    pub params: Vec<(String, String)>,
}

impl RecordedCall {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn where_clause(&self) -> Option<&str> {
        self.param("$where")
    }
}

type Response = Result<Vec<RawRecord>, SodaError>;

/// SODA transport answering from per-dataset queues
///
/// A dataset with an empty queue answers with the default response
/// (zero rows unless built with `failing`).
pub struct ScriptedTransport {
    queues: Mutex<HashMap<String, VecDeque<Response>>>,
    default: Response,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            default: Ok(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every unscripted request fails with `err`
    pub fn failing(err: SodaError) -> Self {
        Self {
            default: Err(err),
            ..Self::new()
        }
    }

    pub fn push(&self, dataset_id: &str, response: Response) -> &Self {
        self.queues
            .lock()
            .unwrap()
            .entry(dataset_id.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn push_rows(&self, dataset_id: &str, rows: Vec<Value>) -> &Self {
        self.push(dataset_id, Ok(rows.into_iter().map(row).collect()))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, dataset_id: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.dataset_id == dataset_id)
            .collect()
    }

    pub fn where_clauses(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.where_clause().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl SodaTransport for ScriptedTransport {
    async fn get(&self, dataset_id: &str, params: &[(String, String)]) -> Result<Vec<RawRecord>, SodaError> {
        self.calls.lock().unwrap().push(RecordedCall {
            dataset_id: dataset_id.to_string(),
            params: params.to_vec(),
        });
        let scripted = self
            .queues
            .lock()
            .unwrap()
            .get_mut(dataset_id)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| self.default.clone())
    }
}

/// SODA transport holding fixed rows per dataset and returning only those
/// the request's `$where` selects
///
/// Understands the clause forms the client writes: `col = 'v'`,
/// `upper(col) = 'V'`, `upper(col) in ('A', 'B')` and `upper(col) like '%T%'`.
pub struct FilteringTransport {
    rows: Mutex<HashMap<String, Vec<RawRecord>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FilteringTransport {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn insert(&self, dataset_id: &str, value: Value) -> &Self {
        self.rows
            .lock()
            .unwrap()
            .entry(dataset_id.to_string())
            .or_default()
            .push(row(value));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

fn quoted_literals(text: &str) -> Vec<String> {
    text.split('\'').skip(1).step_by(2).map(str::to_string).collect()
}

fn clause_matches(record: &RawRecord, clause: &str) -> bool {
    let (upper, rest) = match clause.strip_prefix("upper(") {
        Some(rest) => (true, rest.replacen(')', "", 1)),
        None => (false, clause.to_string()),
    };
    let Some((column, condition)) = rest.split_once(' ') else {
        return false;
    };
    let Some(actual) = record.get(column).and_then(Value::as_str) else {
        return false;
    };
    let actual = if upper { actual.to_uppercase() } else { actual.to_string() };
    let literals = quoted_literals(condition);

    if condition.starts_with("= ") || condition.starts_with("in (") {
        literals.iter().any(|literal| *literal == actual)
    } else if condition.starts_with("like ") {
        literals
            .first()
            .is_some_and(|pattern| actual.contains(pattern.trim_matches('%')))
    } else {
        false
    }
}

#[async_trait]
impl SodaTransport for FilteringTransport {
    async fn get(&self, dataset_id: &str, params: &[(String, String)]) -> Result<Vec<RawRecord>, SodaError> {
        let call = RecordedCall {
            dataset_id: dataset_id.to_string(),
            params: params.to_vec(),
        };
        let where_clause = call.where_clause().unwrap_or_default().to_string();
        self.calls.lock().unwrap().push(call);

        let rows = self.rows.lock().unwrap();
        Ok(rows
            .get(dataset_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| {
                        where_clause.is_empty()
                            || where_clause.split(" AND ").all(|clause| clause_matches(record, clause))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub fn row(value: Value) -> RawRecord {
    value.as_object().cloned().expect("fixture rows are JSON objects")
}

pub fn registry() -> Arc<DatasetRegistry> {
    Arc::new(DatasetRegistry::nyc().unwrap())
}

/// Client over the scripted transport with a negligible retry backoff
pub fn client(transport: &Arc<ScriptedTransport>) -> SodaClient {
    let transport: Arc<dyn SodaTransport> = transport.clone();
    SodaClient::new(transport, RetryPolicy::with_backoff(Duration::from_millis(1)))
}

pub fn filtering_client(transport: &Arc<FilteringTransport>) -> SodaClient {
    let transport: Arc<dyn SodaTransport> = transport.clone();
    SodaClient::new(transport, RetryPolicy::with_backoff(Duration::from_millis(1)))
}

pub fn http_error(status_code: u16, dataset_id: &str) -> SodaError {
    SodaError::UpstreamRequest {
        status_code,
        dataset_id: dataset_id.to_string(),
        message: "scripted failure".to_string(),
    }
}

pub fn timeout_error(dataset_id: &str) -> SodaError {
    SodaError::UpstreamTimeout {
        dataset_id: dataset_id.to_string(),
    }
}

// Dataset ids from the built-in catalog
pub const REGISTRATIONS: &str = "hv8p-yzbx";
pub const HPD: &str = "wvxf-dwi5";
pub const DOB: &str = "3h2n-5cm9";
pub const ELEVATOR: &str = "e5aq-a4j2";
pub const BOILER: &str = "52dp-yji6";
pub const ELECTRICAL: &str = "dm9a-ab7w";
pub const FDNY: &str = "avgm-ztsb";

/// HPD registration row for 140 West 28th Street
pub fn registration_row() -> Value {
    serde_json::json!({
        "registrationid": "100001",
        "buildingid": "20001",
        "bin": "4433339",
        "boroid": "1",
        "block": "1073",
        "lot": "1",
        "housenumber": "140",
        "streetname": "WEST 28 STREET",
        "zip": "10001"
    })
}

pub fn bin_only() -> PropertyIdentifier {
    PropertyIdentifier {
        bin: Some("4433339".to_string()),
        ..Default::default()
    }
}

pub fn block_lot_only() -> PropertyIdentifier {
    PropertyIdentifier {
        borough: Some(Borough::Manhattan),
        block: Some("01073".to_string()),
        lot: Some("0001".to_string()),
        ..Default::default()
    }
    .normalized()
    .unwrap()
}

/// Serve `router` on an ephemeral loopback port
pub async fn spawn_stub(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
