//! Shared test utilities for ledger helper testing.
//!
//! This module provides scripted stand-ins for the SDK seams: a
//! [`MockExecutor`] that records statements, a [`MemoryLedger`] that answers
//! the helper's statements from in-memory tables with full revision history,
//! a [`MockSessionClient`] that drives transactions over a [`MemoryLedger`],
//! and a [`MockControlPlane`] with canned digest and revision responses. It is
//! feature-gated behind `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! ledger-helper = { path = "../ledger-helper", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use ledger_helper::testutil::{MemoryLedger, MockControlPlane, MockSessionClient};
//! ```

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};

use crate::{
    control::ControlPlaneClient,
    digest::{GetDigestRequest, GetDigestResponse},
    driver::{LedgerTransaction, SessionClient},
    error::{ServiceError, ServiceErrorKind},
    executor::TransactionExecutor,
    ion::{BlockAddress, ValueHolder},
    revision::{GetRevisionRequest, GetRevisionResponse},
    statement,
};

/// Strand every [`MemoryLedger`] block is written to.
pub const MEMORY_STRAND_ID: &str = "memory-strand";

type Responder =
    Box<dyn Fn(&str, &[Value]) -> Result<Vec<Value>, ServiceError> + Send + Sync + 'static>;

/// A statement and its parameters, as seen by a [`MockExecutor`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Statement text.
    pub statement: String,
    /// Bound parameters, in order.
    pub parameters: Vec<Value>,
}

/// A [`TransactionExecutor`] that answers every statement from a closure and
/// records what it was asked.
pub struct MockExecutor {
    responder: Responder,
    calls: Mutex<Vec<RecordedCall>>,
}

impl std::fmt::Debug for MockExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockExecutor").field("calls", &self.calls.lock().len()).finish()
    }
}

impl MockExecutor {
    /// Creates an executor answering with `responder`.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &[Value]) -> Result<Vec<Value>, ServiceError> + Send + Sync + 'static,
    {
        Self { responder: Box::new(responder), calls: Mutex::new(Vec::new()) }
    }

    /// Creates an executor returning `rows` for every statement.
    #[must_use]
    pub fn returning(rows: Vec<Value>) -> Self {
        Self::new(move |_, _| Ok(rows.clone()))
    }

    /// Creates an executor failing every statement with `error`.
    #[must_use]
    pub fn failing(error: ServiceError) -> Self {
        Self::new(move |_, _| Err(error.clone()))
    }

    /// Returns every call made so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Returns how many statements were executed.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl TransactionExecutor for MockExecutor {
    async fn execute(
        &self,
        statement: &str,
        parameters: &[Value],
    ) -> Result<Vec<Value>, ServiceError> {
        self.calls.lock().push(RecordedCall {
            statement: statement.to_owned(),
            parameters: parameters.to_vec(),
        });
        (self.responder)(statement, parameters)
    }
}

#[derive(Debug, Clone)]
struct Revision {
    data: Value,
    block: BlockAddress,
}

#[derive(Debug, Default)]
struct LedgerState {
    tables: HashMap<String, Vec<(String, Vec<Revision>)>>,
    next_sequence_no: u64,
    next_document: u64,
    pending_failures: VecDeque<ServiceError>,
}

impl LedgerState {
    fn next_block(&mut self) -> BlockAddress {
        self.next_sequence_no += 1;
        BlockAddress::new(MEMORY_STRAND_ID, self.next_sequence_no)
    }

    fn documents(&self, table: &str) -> &[(String, Vec<Revision>)] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or_default()
    }
}

/// An in-memory ledger answering the statements this crate builds.
///
/// Every [`insert`](Self::insert) and [`update`](Self::update) commits one
/// revision in its own block on [`MEMORY_STRAND_ID`]. Unknown tables read as
/// empty; statements of any other shape fail with
/// [`ServiceErrorKind::BadRequest`].
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a document and returns its assigned id.
    pub fn insert(&self, table: &str, data: Value) -> String {
        let mut state = self.state.lock();
        state.next_document += 1;
        let id = format!("doc{:08}", state.next_document);
        let block = state.next_block();
        state
            .tables
            .entry(table.to_owned())
            .or_default()
            .push((id.clone(), vec![Revision { data, block }]));
        id
    }

    /// Commits a new revision of document `id` and returns its block address.
    ///
    /// # Panics
    ///
    /// Panics if the document does not exist.
    pub fn update(&self, table: &str, id: &str, data: Value) -> BlockAddress {
        let mut state = self.state.lock();
        let block = state.next_block();
        let revisions = state
            .tables
            .get_mut(table)
            .and_then(|docs| docs.iter_mut().find(|(doc_id, _)| doc_id == id))
            .map(|(_, revisions)| revisions)
            .expect("update of unknown document");
        revisions.push(Revision { data, block: block.clone() });
        block
    }

    /// Returns the block address of every revision of document `id`, oldest
    /// first.
    #[must_use]
    pub fn revision_blocks(&self, table: &str, id: &str) -> Vec<BlockAddress> {
        let state = self.state.lock();
        state
            .documents(table)
            .iter()
            .find(|(doc_id, _)| doc_id == id)
            .map(|(_, revisions)| revisions.iter().map(|r| r.block.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns the address of the most recent block written.
    #[must_use]
    pub fn tip(&self) -> BlockAddress {
        BlockAddress::new(MEMORY_STRAND_ID, self.state.lock().next_sequence_no)
    }

    /// Makes the next `execute` call fail with `error`. Queued failures are
    /// used in order.
    pub fn fail_next_execute(&self, error: ServiceError) {
        self.state.lock().pending_failures.push_back(error);
    }

    fn answer(state: &LedgerState, query: &str, parameters: &[Value]) -> Option<Vec<Value>> {
        if let Some(rest) = query.strip_prefix("SELECT * FROM history( ") {
            let (table, _) = rest.split_once(" )")?;
            let id = parameters.first()?;
            if query == statement::select_history_by_id(table) {
                return Some(history_rows(state, table, id, None));
            }
            if query == statement::select_history_by_id_and_block(table) {
                let sequence_no = parameters.get(1)?.as_u64()?;
                return Some(history_rows(state, table, id, Some(sequence_no)));
            }
            return None;
        }

        if let Some(rest) = query.strip_prefix("SELECT id FROM ") {
            let (table, rest) = rest.split_once(' ')?;
            let attribute = rest.strip_prefix("AS t BY id WHERE t.")?.strip_suffix(" = ?")?;
            if query != statement::select_ids_by_attribute(table, attribute) {
                return None;
            }
            let value = parameters.first()?;
            return Some(
                current(state, table)
                    .filter(|(_, data)| data.get(attribute) == Some(value))
                    .map(|(id, _)| json!({ "id": id }))
                    .collect(),
            );
        }

        let rest = query.strip_prefix("SELECT * FROM ")?;
        let (table, rest) = rest.split_once(' ')?;
        if query == statement::select_by_id(table) {
            let id = parameters.first()?;
            return Some(
                current(state, table)
                    .filter(|(doc_id, _)| Some(*doc_id) == id.as_str())
                    .map(|(id, data)| committed_row(id, data))
                    .collect(),
            );
        }
        let condition = rest.strip_prefix("AS d BY id WHERE d.")?;
        if let Some(attribute) = condition.strip_suffix(" = ?") {
            if query != statement::select_by_attribute(table, attribute) {
                return None;
            }
            let value = parameters.first()?;
            return Some(
                current(state, table)
                    .filter(|(_, data)| data.get(attribute) == Some(value))
                    .map(|(id, data)| committed_row(id, data))
                    .collect(),
            );
        }
        let (attribute, _) = condition.split_once(" IN ")?;
        if query != statement::select_by_attributes(table, attribute, parameters.len()) {
            return None;
        }
        Some(
            current(state, table)
                .filter(|(_, data)| data.get(attribute).is_some_and(|v| parameters.contains(v)))
                .map(|(id, data)| committed_row(id, data))
                .collect(),
        )
    }
}

/// Latest revision of every document in `table`.
fn current<'a>(state: &'a LedgerState, table: &str) -> impl Iterator<Item = (&'a str, &'a Value)> {
    state
        .documents(table)
        .iter()
        .filter_map(|(id, revisions)| revisions.last().map(|r| (id.as_str(), &r.data)))
}

fn committed_row(id: &str, data: &Value) -> Value {
    let mut row = match data {
        Value::Object(fields) => fields.clone(),
        other => Map::from_iter([("value".to_owned(), other.clone())]),
    };
    row.insert("id".to_owned(), Value::from(id));
    Value::Object(row)
}

fn history_rows(state: &LedgerState, table: &str, id: &Value, sequence_no: Option<u64>) -> Vec<Value> {
    state
        .documents(table)
        .iter()
        .filter(|(doc_id, _)| Some(doc_id.as_str()) == id.as_str())
        .flat_map(|(doc_id, revisions)| {
            revisions.iter().enumerate().map(move |(version, revision)| (doc_id, version, revision))
        })
        .filter(|(_, _, revision)| sequence_no.is_none_or(|n| revision.block.sequence_no == n))
        .map(|(doc_id, version, revision)| {
            json!({
                "blockAddress": {
                    "strandId": revision.block.strand_id,
                    "sequenceNo": revision.block.sequence_no,
                },
                "data": revision.data,
                "metadata": { "id": doc_id, "version": version },
            })
        })
        .collect()
}

#[async_trait]
impl TransactionExecutor for MemoryLedger {
    async fn execute(
        &self,
        statement: &str,
        parameters: &[Value],
    ) -> Result<Vec<Value>, ServiceError> {
        let mut state = self.state.lock();
        if let Some(error) = state.pending_failures.pop_front() {
            return Err(error);
        }
        Self::answer(&state, statement, parameters).ok_or_else(|| {
            ServiceError::new(
                ServiceErrorKind::BadRequest,
                format!("unsupported statement: {statement}"),
            )
        })
    }
}

/// Transaction counters kept by a [`MockSessionClient`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Calls to `start_transaction`, including failed ones.
    pub start_attempts: usize,
    /// Transactions successfully started.
    pub started: usize,
    /// Transactions committed.
    pub committed: usize,
    /// Transactions aborted.
    pub aborted: usize,
}

#[derive(Debug, Default)]
struct SessionState {
    stats: SessionStats,
    ledger_names: Vec<String>,
    start_failures: Option<(usize, ServiceError)>,
    commit_failures: Option<(usize, ServiceError)>,
}

fn take_failure(slot: &mut Option<(usize, ServiceError)>) -> Option<ServiceError> {
    let (remaining, error) = slot.as_mut()?;
    let error = error.clone();
    *remaining -= 1;
    if *remaining == 0 {
        *slot = None;
    }
    Some(error)
}

/// A [`SessionClient`] whose transactions read from a shared [`MemoryLedger`].
#[derive(Debug, Clone)]
pub struct MockSessionClient {
    ledger: Arc<MemoryLedger>,
    state: Arc<Mutex<SessionState>>,
}

impl MockSessionClient {
    /// Creates a client over `ledger`.
    #[must_use]
    pub fn new(ledger: MemoryLedger) -> Self {
        Self::shared(Arc::new(ledger))
    }

    /// Creates a client over a ledger the test keeps a handle to.
    #[must_use]
    pub fn shared(ledger: Arc<MemoryLedger>) -> Self {
        Self { ledger, state: Arc::default() }
    }

    /// Returns the backing ledger.
    #[must_use]
    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }

    /// Makes the next `count` calls to `start_transaction` fail with `error`.
    pub fn fail_starts(&self, count: usize, error: ServiceError) {
        self.state.lock().start_failures = (count > 0).then_some((count, error));
    }

    /// Makes the next `count` commits fail with `error`.
    pub fn fail_commits(&self, count: usize, error: ServiceError) {
        self.state.lock().commit_failures = (count > 0).then_some((count, error));
    }

    /// Returns the transaction counters.
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.state.lock().stats
    }

    /// Returns the ledger name passed to every `start_transaction` call.
    #[must_use]
    pub fn ledger_names(&self) -> Vec<String> {
        self.state.lock().ledger_names.clone()
    }
}

#[async_trait]
impl SessionClient for MockSessionClient {
    type Transaction = MockTransaction;

    async fn start_transaction(&self, ledger_name: &str) -> Result<MockTransaction, ServiceError> {
        let mut state = self.state.lock();
        state.stats.start_attempts += 1;
        state.ledger_names.push(ledger_name.to_owned());
        if let Some(error) = take_failure(&mut state.start_failures) {
            return Err(error);
        }
        state.stats.started += 1;
        Ok(MockTransaction {
            id: format!("txn-{}", state.stats.started),
            ledger: Arc::clone(&self.ledger),
            state: Arc::clone(&self.state),
        })
    }
}

/// Transaction handed out by a [`MockSessionClient`].
#[derive(Debug)]
pub struct MockTransaction {
    id: String,
    ledger: Arc<MemoryLedger>,
    state: Arc<Mutex<SessionState>>,
}

#[async_trait]
impl TransactionExecutor for MockTransaction {
    async fn execute(
        &self,
        statement: &str,
        parameters: &[Value],
    ) -> Result<Vec<Value>, ServiceError> {
        self.ledger.execute(statement, parameters).await
    }
}

#[async_trait]
impl LedgerTransaction for MockTransaction {
    fn transaction_id(&self) -> &str {
        &self.id
    }

    async fn commit(&self) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        if let Some(error) = take_failure(&mut state.commit_failures) {
            return Err(error);
        }
        state.stats.committed += 1;
        Ok(())
    }

    async fn abort(&self) -> Result<(), ServiceError> {
        self.state.lock().stats.aborted += 1;
        Ok(())
    }
}

/// A [`ControlPlaneClient`] with canned responses that records every request.
///
/// Calls with no canned response fail with [`ServiceErrorKind::NotFound`].
#[derive(Debug, Default)]
pub struct MockControlPlane {
    digest: Option<Result<GetDigestResponse, ServiceError>>,
    revision: Option<Result<GetRevisionResponse, ServiceError>>,
    digest_requests: Mutex<Vec<GetDigestRequest>>,
    revision_requests: Mutex<Vec<GetRevisionRequest>>,
}

impl MockControlPlane {
    /// Creates a control plane with no canned responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every digest request with `response`.
    #[must_use]
    pub fn with_digest(mut self, response: Result<GetDigestResponse, ServiceError>) -> Self {
        self.digest = Some(response);
        self
    }

    /// Answers every revision request with `response`.
    #[must_use]
    pub fn with_revision(mut self, response: Result<GetRevisionResponse, ServiceError>) -> Self {
        self.revision = Some(response);
        self
    }

    /// Returns every digest request received, oldest first.
    #[must_use]
    pub fn digest_requests(&self) -> Vec<GetDigestRequest> {
        self.digest_requests.lock().clone()
    }

    /// Returns every revision request received, oldest first.
    #[must_use]
    pub fn revision_requests(&self) -> Vec<GetRevisionRequest> {
        self.revision_requests.lock().clone()
    }
}

#[async_trait]
impl ControlPlaneClient for MockControlPlane {
    async fn get_digest(
        &self,
        request: GetDigestRequest,
    ) -> Result<GetDigestResponse, ServiceError> {
        self.digest_requests.lock().push(request);
        self.digest.clone().unwrap_or_else(|| {
            Err(ServiceError::new(ServiceErrorKind::NotFound, "no digest configured"))
        })
    }

    async fn get_revision(
        &self,
        request: GetRevisionRequest,
    ) -> Result<GetRevisionResponse, ServiceError> {
        self.revision_requests.lock().push(request);
        self.revision.clone().unwrap_or_else(|| {
            Err(ServiceError::new(ServiceErrorKind::NotFound, "no revision configured"))
        })
    }
}

/// Builds a digest response over `digest` with its tip at `strand_id` /
/// `sequence_no`.
#[must_use]
pub fn digest_response(digest: &[u8], strand_id: &str, sequence_no: u64) -> GetDigestResponse {
    GetDigestResponse {
        digest: Bytes::copy_from_slice(digest),
        digest_tip_address: ValueHolder::from(&BlockAddress::new(strand_id, sequence_no)),
    }
}

/// Builds a revision response carrying `revision_ion`, with a fixed proof if
/// `with_proof` is set.
#[must_use]
pub fn revision_response(revision_ion: &str, with_proof: bool) -> GetRevisionResponse {
    GetRevisionResponse {
        proof: with_proof.then(|| ValueHolder::new("[{{dGVzdC1wcm9vZi1oYXNo}}]")),
        revision: ValueHolder::new(revision_ion),
    }
}
