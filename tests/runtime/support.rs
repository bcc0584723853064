use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use storefront_sync::{
    InMemorySyncAdapter, Record, SyncAdapter, SyncError, SyncRequest, SyncResponse,
};

/// In-memory server that holds chosen tickets back for a while.
#[derive(Clone)]
pub struct SlowAdapter<R> {
    server: InMemorySyncAdapter<R>,
    delays: Arc<Mutex<HashMap<u64, Duration>>>,
}

impl<R: Record> SlowAdapter<R> {
    pub fn new() -> Self {
        Self {
            server: InMemorySyncAdapter::new(),
            delays: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn delay(&self, ticket: u64, by: Duration) {
        self.delays.lock().unwrap().insert(ticket, by);
    }

    pub fn server(&self) -> &InMemorySyncAdapter<R> {
        &self.server
    }
}

#[async_trait]
impl<R: Record> SyncAdapter<R> for SlowAdapter<R> {
    async fn execute(&self, request: &SyncRequest<R>) -> Result<SyncResponse<R>, SyncError> {
        let delay = self.delays.lock().unwrap().get(&request.ticket).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.server.execute(request).await
    }
}

/// Adapter whose requests blow up mid-flight.
pub struct PanickingAdapter;

#[async_trait]
impl<R: Record> SyncAdapter<R> for PanickingAdapter {
    async fn execute(&self, _request: &SyncRequest<R>) -> Result<SyncResponse<R>, SyncError> {
        panic!("adapter bug")
    }
}
