//! InMemorySyncAdapter - an in-process backend for tests and offline development.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{SyncAdapter, SyncOp, SyncRequest, SyncResponse};
use crate::error::SyncError;
use crate::record::Record;

struct Backend<R> {
    records: Vec<R>,
    next_id: u64,
    failures: VecDeque<SyncError>,
    handled: Vec<String>,
}

/// A server stand-in holding canonical records in memory.
///
/// Assigns permanent ids of the form `<collection>-<n>`, merges creates that
/// repeat a natural key into the existing record, and can be told to fail the
/// next requests. Clone-friendly (clones share the backend).
#[derive(Clone)]
pub struct InMemorySyncAdapter<R> {
    backend: Arc<RwLock<Backend<R>>>,
}

impl<R: Record> Default for InMemorySyncAdapter<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> InMemorySyncAdapter<R> {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Start with records already on the server.
    pub fn with_records(records: Vec<R>) -> Self {
        Self {
            backend: Arc::new(RwLock::new(Backend {
                next_id: next_free_id(&records),
                records,
                failures: VecDeque::new(),
                handled: Vec::new(),
            })),
        }
    }

    /// Make the next request fail with `error`. Calls queue up.
    pub fn fail_next(&self, error: SyncError) {
        if let Ok(mut backend) = self.backend.write() {
            backend.failures.push_back(error);
        }
    }

    /// Server-side records in insertion order.
    pub fn records(&self) -> Vec<R> {
        self.backend
            .read()
            .map(|backend| backend.records.clone())
            .unwrap_or_default()
    }

    /// Names of handled operations, failures included, e.g. `"create"`.
    pub fn handled(&self) -> Vec<String> {
        self.backend
            .read()
            .map(|backend| backend.handled.clone())
            .unwrap_or_default()
    }
}

/// One past the highest `<collection>-<n>` id already taken.
fn next_free_id<R: Record>(records: &[R]) -> u64 {
    let prefix = format!("{}-", R::COLLECTION);
    records
        .iter()
        .filter_map(|record| record.id().strip_prefix(&prefix)?.parse::<u64>().ok())
        .max()
        .map_or(1, |highest| highest.saturating_add(1))
}

impl<R: Record> Backend<R> {
    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|record| record.id() == id)
    }

    fn apply(&mut self, op: &SyncOp<R>) -> Result<SyncResponse<R>, SyncError> {
        match op {
            SyncOp::Create { record, .. } => {
                let key = record.natural_key();
                if let Some(index) = self
                    .records
                    .iter()
                    .position(|existing| existing.natural_key() == key)
                {
                    let merged = record.absorb(&self.records[index]);
                    self.records[index] = merged.clone();
                    return Ok(SyncResponse::Record(merged));
                }

                let mut created = record.clone();
                created.set_id(format!("{}-{}", R::COLLECTION, self.next_id));
                self.next_id += 1;
                self.records.push(created.clone());
                Ok(SyncResponse::Record(created))
            }
            SyncOp::Update { id, record, .. } => {
                let index = self
                    .position(id)
                    .ok_or_else(|| SyncError::not_found(format!("{} {}", R::COLLECTION, id)))?;
                let mut updated = record.clone();
                updated.set_id(id.clone());
                self.records[index] = updated.clone();
                Ok(SyncResponse::Record(updated))
            }
            SyncOp::Delete { id, .. } => {
                let index = self
                    .position(id)
                    .ok_or_else(|| SyncError::not_found(format!("{} {}", R::COLLECTION, id)))?;
                self.records.remove(index);
                Ok(SyncResponse::Removed)
            }
            SyncOp::Clear { .. } => {
                self.records.clear();
                Ok(SyncResponse::Removed)
            }
            SyncOp::Load => Ok(SyncResponse::Records(self.records.clone())),
        }
    }
}

#[async_trait]
impl<R: Record> SyncAdapter<R> for InMemorySyncAdapter<R> {
    async fn execute(&self, request: &SyncRequest<R>) -> Result<SyncResponse<R>, SyncError> {
        let mut backend = self
            .backend
            .write()
            .map_err(|_| SyncError::server("backend lock poisoned"))?;
        backend.handled.push(request.op.name().to_string());

        if let Some(error) = backend.failures.pop_front() {
            return Err(error.with_context(format!("ticket {}", request.ticket)));
        }

        backend.apply(&request.op)
    }
}
