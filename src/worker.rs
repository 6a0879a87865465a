//! Isolated computation units.
//!
//! Each indexer is a single tokio task that exclusively owns its state and
//! talks to the host only through channels. Requests are handled one at a
//! time, to completion, in arrival order; every accepted request produces
//! exactly one response carrying its `requestId`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::observability;
use crate::protocol::{Envelope, Reply, Request, RequestError, Response, Unit};

/// A request handler that runs inside its own unit.
pub trait Indexer: Send + 'static {
    const UNIT: Unit;

    fn handle(&mut self, request: Request) -> Result<Reply, RequestError>;
}

/// Inbound side of a running unit.
#[derive(Debug, Clone)]
pub struct IndexerHandle {
    unit: Unit,
    tx: mpsc::Sender<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitStopped(pub Unit);

impl std::fmt::Display for UnitStopped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} indexer stopped", self.0.label())
    }
}

impl std::error::Error for UnitStopped {}

impl IndexerHandle {
    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Queue a raw envelope. Envelopes the unit does not recognize are dropped by it.
    pub async fn send(&self, envelope: Value) -> Result<(), UnitStopped> {
        self.tx.send(envelope).await.map_err(|_| UnitStopped(self.unit))
    }
}

/// Start `indexer` on its own task. Responses go to `responses`; the unit
/// stops when every handle is dropped or the response channel closes.
pub fn spawn<I: Indexer>(
    indexer: I,
    capacity: usize,
    responses: mpsc::Sender<Response>,
) -> IndexerHandle {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(indexer_loop(indexer, rx, responses));
    IndexerHandle { unit: I::UNIT, tx }
}

async fn indexer_loop<I: Indexer>(
    mut indexer: I,
    mut rx: mpsc::Receiver<Value>,
    responses: mpsc::Sender<Response>,
) {
    let unit = I::UNIT.label();
    while let Some(raw) = rx.recv().await {
        let Some(response) = serve(&mut indexer, raw) else {
            observability::record_ignored(unit);
            continue;
        };
        if responses.send(response).await.is_err() {
            debug!("response channel closed, stopping {unit} indexer");
            break;
        }
    }
    debug!("{unit} indexer stopped");
}

/// Handle one raw envelope. `None` means it was not addressed to this unit.
pub fn serve<I: Indexer>(indexer: &mut I, raw: Value) -> Option<Response> {
    let unit = I::UNIT;
    let Some(envelope) = Envelope::parse(raw) else {
        debug!("{}: ignoring envelope without a type", unit.label());
        return None;
    };
    if Unit::of(&envelope.kind) != Some(unit) {
        debug!("{}: ignoring {:?} envelope", unit.label(), envelope.kind);
        return None;
    }

    let Envelope { kind, request_id, payload } = envelope;
    let started = Instant::now();
    let outcome = Request::decode(&kind, payload).and_then(|request| {
        panic::catch_unwind(AssertUnwindSafe(|| indexer.handle(request)))
            .unwrap_or_else(|p| Err(RequestError::Panicked(panic_message(p.as_ref()))))
    });
    observability::record_request(unit.label(), outcome.is_ok(), started);

    Some(match outcome {
        Ok(reply) => {
            debug!("{}: {kind} {request_id} done", unit.label());
            Response::success(request_id, reply)
        }
        Err(e) => {
            warn!("{}: {kind} {request_id} failed: {e}", unit.label());
            Response::failure(unit, request_id, e.to_string())
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
