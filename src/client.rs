use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use ulid::Ulid;

use crate::config::Config;
use crate::day_slots::DaySlotIndexer;
use crate::protocol::{self, Response, Unit};
use crate::scene::MonthScene;
use crate::worker::{self, IndexerHandle};

type Pending = Arc<DashMap<String, oneshot::Sender<Response>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    UnknownType(String),
    Closed,
    TimedOut(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::UnknownType(kind) => write!(f, "no indexer handles {kind:?}"),
            ClientError::Closed => write!(f, "indexer stopped"),
            ClientError::TimedOut(id) => write!(f, "request {id} timed out"),
        }
    }
}

impl std::error::Error for ClientError {}

/// Host-side handle to both indexers. Issues ULID request ids and matches
/// responses back to callers; responses nobody waits for are dropped.
pub struct IndexerClient {
    day: IndexerHandle,
    month: IndexerHandle,
    pending: Pending,
}

impl IndexerClient {
    /// Start both units and the response dispatcher.
    pub fn spawn(config: &Config) -> Self {
        let (resp_tx, resp_rx) = mpsc::channel(config.channel_capacity);
        let day = worker::spawn(
            DaySlotIndexer::new(config.day_grid()),
            config.channel_capacity,
            resp_tx.clone(),
        );
        let month = worker::spawn(
            MonthScene::from_config(config),
            config.channel_capacity,
            resp_tx,
        );
        let pending: Pending = Arc::new(DashMap::new());
        tokio::spawn(dispatch_loop(resp_rx, pending.clone()));
        Self { day, month, pending }
    }

    pub async fn index_day(&self, payload: Value) -> Result<Response, ClientError> {
        self.request(protocol::TYPE_INDEX, payload).await
    }

    pub async fn reset_month(&self, payload: Value) -> Result<Response, ClientError> {
        self.request(protocol::TYPE_INDEX_MONTH_RESET, payload).await
    }

    pub async fn patch_month(&self, payload: Value) -> Result<Response, ClientError> {
        self.request(protocol::TYPE_INDEX_MONTH_PATCH, payload).await
    }

    pub async fn request(&self, kind: &str, payload: Value) -> Result<Response, ClientError> {
        let (_, rx) = self.submit(kind, payload).await?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Like [`request`](Self::request), but gives up after `limit`. A response
    /// arriving later is discarded.
    pub async fn request_within(
        &self,
        kind: &str,
        payload: Value,
        limit: Duration,
    ) -> Result<Response, ClientError> {
        let (request_id, rx) = self.submit(kind, payload).await?;
        match tokio::time::timeout(limit, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ClientError::Closed),
            Err(_) => {
                self.pending.remove(&request_id);
                Err(ClientError::TimedOut(request_id))
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    async fn submit(
        &self,
        kind: &str,
        payload: Value,
    ) -> Result<(String, oneshot::Receiver<Response>), ClientError> {
        let handle = match Unit::of(kind) {
            Some(Unit::DaySlots) => &self.day,
            Some(Unit::MonthScene) => &self.month,
            None => return Err(ClientError::UnknownType(kind.to_string())),
        };
        let request_id = Ulid::new().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), tx);

        let envelope = json!({ "type": kind, "requestId": request_id, "payload": payload });
        if handle.send(envelope).await.is_err() {
            self.pending.remove(&request_id);
            return Err(ClientError::Closed);
        }
        Ok((request_id, rx))
    }
}

async fn dispatch_loop(mut rx: mpsc::Receiver<Response>, pending: Pending) {
    while let Some(response) = rx.recv().await {
        let Some(request_id) = response.request_id().as_str() else {
            debug!("dropping response without a string request id");
            continue;
        };
        match pending.remove(request_id) {
            Some((_, tx)) => {
                let _ = tx.send(response);
            }
            None => debug!("dropping late response {request_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_type_is_rejected_locally() {
        let client = IndexerClient::spawn(&Config::default());
        let err = client.request("render", json!({})).await.unwrap_err();
        assert_eq!(err, ClientError::UnknownType("render".into()));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn responses_are_matched_to_callers() {
        let client = IndexerClient::spawn(&Config::default());
        let (day, month) = tokio::join!(
            client.index_day(json!({ "selectedYmd": "2025-03-10" })),
            client.reset_month(json!({ "monthKey": "2025-03" })),
        );
        assert!(matches!(day.unwrap(), Response::IndexResult { .. }));
        assert!(matches!(month.unwrap(), Response::MonthIndexResult { .. }));
        assert_eq!(client.pending_count(), 0);
    }
}
