//! Shared test helpers for `graphbatch-core` integration tests.
//!
//! A scripted in-memory transport records every physical batch call and
//! answers each entry through a closure, so tests can focus on queue and
//! paging behaviour instead of HTTP.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use graphbatch_core::{BatchTransport, GraphClient, ProofProvider, QueueRegistry};
use graphbatch_domain::{BatchEntry, BatchSlot, GraphError, GraphSettings, RawResponse, Result};
use parking_lot::Mutex;
use serde_json::Value;

/// Answers one entry; `attempt` counts earlier calls for the same target.
pub type Responder = Box<dyn Fn(&BatchEntry, usize) -> BatchSlot + Send + Sync>;

/// In-memory `BatchTransport` driven by a responder closure.
pub struct ScriptedTransport {
    responder: Responder,
    calls: Mutex<Vec<Vec<BatchEntry>>>,
    attempts: Mutex<HashMap<String, usize>>,
    fail_next: Mutex<Option<GraphError>>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&BatchEntry, usize) -> BatchSlot + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
            attempts: Mutex::new(HashMap::new()),
            fail_next: Mutex::new(None),
        })
    }

    /// Transport that answers every entry with `value` as its body.
    pub fn always(value: Value) -> Arc<Self> {
        Self::new(move |_, _| ok(&value))
    }

    /// Entries of every physical call, in call order.
    pub fn calls(&self) -> Vec<Vec<BatchEntry>> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Make the next physical call fail as a whole.
    pub fn fail_next(&self, failure: GraphError) {
        *self.fail_next.lock() = Some(failure);
    }
}

#[async_trait]
impl BatchTransport for ScriptedTransport {
    async fn execute(&self, _scope: &str, entries: &[BatchEntry]) -> Result<Vec<BatchSlot>> {
        self.calls.lock().push(entries.to_vec());

        if let Some(failure) = self.fail_next.lock().take() {
            return Err(failure);
        }

        let mut attempts = self.attempts.lock();
        Ok(entries
            .iter()
            .map(|entry| {
                let attempt = attempts.entry(entry.relative_url.clone()).or_insert(0);
                let slot = (self.responder)(entry, *attempt);
                *attempt += 1;
                slot
            })
            .collect())
    }
}

/// Proof provider producing `proof(secret,token)`.
pub struct StaticProof;

impl ProofProvider for StaticProof {
    fn proof(&self, secret: &str, token: &str) -> String {
        format!("proof({secret},{token})")
    }
}

/// A 200 slot with `value` as its JSON body.
pub fn ok(value: &Value) -> BatchSlot {
    BatchSlot::Completed(RawResponse::json(value))
}

/// A slot with an explicit status and body.
pub fn status(code: u16, value: &Value) -> BatchSlot {
    BatchSlot::Completed(RawResponse::new(code, value.to_string()))
}

/// Path of an entry's relative URL, without the query.
pub fn path_of(entry: &BatchEntry) -> &str {
    entry.relative_url.split('?').next().unwrap_or_default()
}

pub fn registry(settings: GraphSettings, transport: &Arc<ScriptedTransport>) -> Arc<QueueRegistry> {
    let transport: Arc<dyn BatchTransport> = Arc::clone(transport) as Arc<dyn BatchTransport>;
    Arc::new(QueueRegistry::new(settings, transport, Arc::new(StaticProof)).expect("valid settings"))
}

/// Client for user token `tok` in scope `app`.
pub fn client(registry: &Arc<QueueRegistry>) -> GraphClient {
    GraphClient::new(Arc::clone(registry), Some("tok".into()), Some("app".into())).expect("client")
}

/// Install a test subscriber so `RUST_LOG` shows queue logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
