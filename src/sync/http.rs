//! HttpSyncAdapter - JSON over HTTP, one REST resource per collection.
//!
//! | op     | request                          | success body |
//! |--------|----------------------------------|--------------|
//! | create | `POST   {base}/{collection}`      | record       |
//! | update | `PUT    {base}/{collection}/{id}` | record       |
//! | delete | `DELETE {base}/{collection}/{id}` | ignored      |
//! | clear  | `DELETE {base}/{collection}`      | ignored      |
//! | load   | `GET    {base}/{collection}`      | `[record]`   |
//!
//! Error responses may carry `{ "message": ..., "code": ... }`; otherwise the
//! status code picks the category and the body text becomes the message.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{SyncAdapter, SyncOp, SyncRequest, SyncResponse};
use crate::error::{ErrorCode, SyncError};
use crate::record::Record;

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<ErrorCode>,
}

pub struct HttpSyncAdapter<R> {
    client: reqwest::Client,
    base_url: String,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Record> HttpSyncAdapter<R> {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            _marker: PhantomData,
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, R::COLLECTION)
    }

    /// Ids are pushed as one percent-encoded path segment.
    fn record_url(&self, id: &str) -> Result<reqwest::Url, SyncError> {
        let mut url = reqwest::Url::parse(&self.collection_url())
            .map_err(|e| SyncError::validation(format!("invalid base url {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| SyncError::validation(format!("base url {} cannot take a path", self.base_url)))?
            .push(id);
        Ok(url)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, SyncError> {
        let response = builder
            .send()
            .await
            .map_err(|e| SyncError::network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!("{}: HTTP {} {}", R::COLLECTION, status.as_u16(), body);
        let error = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => SyncError::new(
                parsed
                    .code
                    .unwrap_or_else(|| ErrorCode::from_status(status.as_u16())),
                parsed.message,
            ),
            Err(_) => {
                let message = if body.is_empty() {
                    status.to_string()
                } else {
                    body
                };
                SyncError::new(ErrorCode::from_status(status.as_u16()), message)
            }
        };
        Err(error)
    }

    async fn perform(&self, op: &SyncOp<R>) -> Result<SyncResponse<R>, SyncError> {
        match op {
            SyncOp::Create { record, .. } => {
                let response = self
                    .send(self.client.post(self.collection_url()).json(record))
                    .await?;
                Self::decode::<R>(response).await.map(SyncResponse::Record)
            }
            SyncOp::Update { id, record, .. } => {
                let response = self
                    .send(self.client.put(self.record_url(id)?).json(record))
                    .await?;
                Self::decode::<R>(response).await.map(SyncResponse::Record)
            }
            SyncOp::Delete { id, .. } => {
                self.send(self.client.delete(self.record_url(id)?)).await?;
                Ok(SyncResponse::Removed)
            }
            SyncOp::Clear { .. } => {
                self.send(self.client.delete(self.collection_url())).await?;
                Ok(SyncResponse::Removed)
            }
            SyncOp::Load => {
                let response = self.send(self.client.get(self.collection_url())).await?;
                Self::decode::<Vec<R>>(response)
                    .await
                    .map(SyncResponse::Records)
            }
        }
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SyncError> {
        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::server(format!("undecodable response: {}", e)))
    }
}

#[async_trait]
impl<R: Record> SyncAdapter<R> for HttpSyncAdapter<R> {
    async fn execute(&self, request: &SyncRequest<R>) -> Result<SyncResponse<R>, SyncError> {
        self.perform(&request.op)
            .await
            .map_err(|err| err.with_context(format!("ticket {} {}", request.ticket, request.op.name())))
    }
}
