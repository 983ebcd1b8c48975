//! In-memory collaborators for engine tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use dal_common::{DalError, DalResult};
use dal_protocol::{
    CatalogRow, CutoutRequest, CutoutTask, DatasetLocator, KeywordMap, QueryExecutor, RowCursor,
};

/// A catalog that returns a fixed set of rows for any query.
///
/// Query texts are recorded so tests can assert on what was executed, and
/// open/close calls are counted so tests can check handles are released.
#[derive(Debug, Default)]
pub struct MemoryExecutor {
    rows: Vec<CatalogRow>,
    fail_with: Option<String>,
    queries: Mutex<Vec<String>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl MemoryExecutor {
    pub fn new(rows: Vec<CatalogRow>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// An executor whose queries always fail.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    /// Query texts executed so far.
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .map(|q| q.clone())
            .unwrap_or_default()
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl QueryExecutor for MemoryExecutor {
    type Handle = usize;
    type Cursor = RowCursor;

    fn open(&self) -> DalResult<usize> {
        Ok(self.opened.fetch_add(1, Ordering::SeqCst))
    }

    fn execute(&self, _handle: &mut usize, text: &str) -> DalResult<RowCursor> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(text.to_string());
        }
        match &self.fail_with {
            Some(message) => Err(DalError::external_query(message.clone())),
            None => Ok(RowCursor::new(self.rows.clone())),
        }
    }

    fn close(&self, _handle: usize) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// A locator backed by a map from dataset key to file path.
#[derive(Debug, Default, Clone)]
pub struct StaticLocator {
    paths: HashMap<String, String>,
    fail: bool,
}

impl StaticLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the file of the dataset whose PubDID ends with `:<key>`.
    pub fn with_file(mut self, key: impl Into<String>, path: impl Into<String>) -> Self {
        self.paths.insert(key.into(), path.into());
        self
    }

    /// A locator whose lookups always fail.
    pub fn failing() -> Self {
        Self {
            paths: HashMap::new(),
            fail: true,
        }
    }
}

impl DatasetLocator for StaticLocator {
    fn locate(&self, publisher_did: &str) -> DalResult<Option<String>> {
        if self.fail {
            return Err(DalError::external_query("locator unavailable"));
        }
        let key = dal_protocol::constraints::dataset_key(publisher_did);
        Ok(self.paths.get(key).cloned())
    }
}

/// How a [`StubCutoutTask`] responds.
#[derive(Debug, Clone)]
pub enum StubResponse {
    /// Return these keywords for every file.
    Keywords(KeywordMap),
    /// Return nothing.
    Empty,
    /// Fail with a task error.
    Fail(String),
}

/// A cutout task with canned responses, optionally per file path.
#[derive(Debug)]
pub struct StubCutoutTask {
    default: StubResponse,
    per_path: HashMap<String, StubResponse>,
    calls: Mutex<Vec<(String, CutoutRequest)>>,
}

impl StubCutoutTask {
    pub fn new(default: StubResponse) -> Self {
        Self {
            default,
            per_path: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Respond to every file with these `KEY = value` pairs.
    pub fn returning<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(StubResponse::Keywords(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    pub fn with_path_response(mut self, path: impl Into<String>, response: StubResponse) -> Self {
        self.per_path.insert(path.into(), response);
        self
    }

    /// Paths and requests the task was called with.
    pub fn calls(&self) -> Vec<(String, CutoutRequest)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl CutoutTask for StubCutoutTask {
    fn compute(&self, path: &str, request: &CutoutRequest) -> DalResult<Option<KeywordMap>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((path.to_string(), request.clone()));
        }
        match self.per_path.get(path).unwrap_or(&self.default) {
            StubResponse::Keywords(keywords) => Ok(Some(keywords.clone())),
            StubResponse::Empty => Ok(None),
            StubResponse::Fail(message) => Err(DalError::external_task(message.clone())),
        }
    }
}
