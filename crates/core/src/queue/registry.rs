//! Scope-keyed queue registry

use std::collections::HashMap;
use std::sync::Arc;

use graphbatch_domain::{GraphSettings, Result};
use parking_lot::Mutex;
use tracing::debug;

use super::{QueueSnapshot, ScopeQueue};
use crate::batch::{BatchBuilder, BatchTransport, ProofProvider};
use crate::handle::{HandleSnapshot, RequestHandle};

/// Owns the live queue of every scope
///
/// Callers that share a registry and a scope token share a queue, so their
/// requests are coalesced into the same batches.
pub struct QueueRegistry {
    settings: Arc<GraphSettings>,
    transport: Arc<dyn BatchTransport>,
    proofs: Arc<dyn ProofProvider>,
    queues: Mutex<HashMap<String, Arc<ScopeQueue>>>,
}

impl QueueRegistry {
    /// # Errors
    ///
    /// Returns `GraphError::Config` when `settings` are invalid.
    pub fn new(
        settings: GraphSettings,
        transport: Arc<dyn BatchTransport>,
        proofs: Arc<dyn ProofProvider>,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings: Arc::new(settings),
            transport,
            proofs,
            queues: Mutex::new(HashMap::new()),
        })
    }

    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    /// The queue for `scope`, created on first use.
    pub fn queue(&self, scope: &str) -> Arc<ScopeQueue> {
        let mut queues = self.queues.lock();
        let queue = queues.entry(scope.to_owned()).or_insert_with(|| {
            let builder = Arc::new(BatchBuilder::new(Arc::clone(&self.settings), Arc::clone(&self.proofs)));
            Arc::new(ScopeQueue::new(scope, builder, Arc::clone(&self.transport)))
        });
        Arc::clone(queue)
    }

    /// Number of live queues.
    pub fn len(&self) -> usize {
        self.queues.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.lock().is_empty()
    }

    /// Drop every queue. Pending handles of dropped queues fail with
    /// `GraphError::QueueTimedOut` when they next need synchronization.
    pub fn reset(&self) {
        let dropped = std::mem::take(&mut *self.queues.lock());
        debug!(queues = dropped.len(), "reset queue registry");
    }

    /// Rebuild a handle from a snapshot onto the live queue of its scope.
    pub fn restore(&self, snapshot: HandleSnapshot) -> RequestHandle {
        let queue = self.queue(&snapshot.scope);
        RequestHandle::restore(&queue, snapshot)
    }

    /// The live queue for a queue snapshot's scope.
    pub fn restore_queue(&self, snapshot: &QueueSnapshot) -> Arc<ScopeQueue> {
        self.queue(&snapshot.scope)
    }
}

impl std::fmt::Debug for QueueRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueRegistry").field("queues", &self.len()).finish_non_exhaustive()
    }
}
