//! Remote sync - the seam between the store and whatever backs it.
//!
//! The dispatcher turns commands into [`SyncRequest`]s; a [`SyncAdapter`]
//! performs them and answers with a [`SyncResponse`] or a [`SyncError`].
//! There is no retry: every failure is final for that attempt and a new
//! user command is needed to try again.

mod in_memory;

#[cfg(feature = "http")]
mod http;

use std::sync::Arc;

use async_trait::async_trait;

use crate::collection::{EntityCollection, Prior};
use crate::error::SyncError;
use crate::record::Record;

pub use in_memory::InMemorySyncAdapter;

#[cfg(feature = "http")]
pub use http::HttpSyncAdapter;

/// The remote operation a request asks for, with what is needed to undo it.
#[derive(Debug, Clone)]
pub enum SyncOp<R> {
    Create { temp_id: String, record: R },
    Update { id: String, record: R, prior: Prior<R> },
    Delete { id: String, prior: Prior<R> },
    Clear { snapshot: EntityCollection<R> },
    Load,
}

impl<R> SyncOp<R> {
    pub fn name(&self) -> &'static str {
        match self {
            SyncOp::Create { .. } => "create",
            SyncOp::Update { .. } => "update",
            SyncOp::Delete { .. } => "delete",
            SyncOp::Clear { .. } => "clear",
            SyncOp::Load => "load",
        }
    }

    /// Id of the record the operation targets, if it targets one.
    pub fn target(&self) -> Option<&str> {
        match self {
            SyncOp::Create { temp_id, .. } => Some(temp_id),
            SyncOp::Update { id, .. } | SyncOp::Delete { id, .. } => Some(id),
            SyncOp::Clear { .. } | SyncOp::Load => None,
        }
    }
}

/// A deferred network request produced by the dispatcher.
#[derive(Debug, Clone)]
pub struct SyncRequest<R> {
    /// Monotonic per-dispatcher sequence number, for logging.
    pub ticket: u64,
    pub op: SyncOp<R>,
}

/// Canonical server answer.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncResponse<R> {
    Record(R),
    Records(Vec<R>),
    Removed,
}

/// Performs sync requests against the backing service.
#[async_trait]
pub trait SyncAdapter<R: Record>: Send + Sync {
    async fn execute(&self, request: &SyncRequest<R>) -> Result<SyncResponse<R>, SyncError>;
}

#[async_trait]
impl<R, A> SyncAdapter<R> for Arc<A>
where
    R: Record,
    A: SyncAdapter<R> + ?Sized,
{
    async fn execute(&self, request: &SyncRequest<R>) -> Result<SyncResponse<R>, SyncError> {
        (**self).execute(request).await
    }
}
