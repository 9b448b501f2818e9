//! Per-scope pending queue and its synchronization loop
//!
//! One [`ScopeQueue`] exists per scope token inside a [`QueueRegistry`].
//! Requests sharing a scope are coalesced into the same physical batches.

mod registry;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use graphbatch_domain::{BatchSlot, GraphError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

pub use self::registry::QueueRegistry;
use crate::batch::{dedup, redup, BatchBuilder, BatchTransport, DedupGroups, PreparedBatch};
use crate::handle::RequestHandle;

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

/// Logs at INFO when `debug_requests` is on, DEBUG otherwise.
macro_rules! request_log {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

/// Pending requests of one scope
pub struct ScopeQueue {
    id: u64,
    scope: String,
    builder: Arc<BatchBuilder>,
    transport: Arc<dyn BatchTransport>,
    pending: Mutex<Vec<RequestHandle>>,
    /// Serializes synchronization passes.
    sync_lock: tokio::sync::Mutex<()>,
}

/// Serializable reference to the queue of a scope; pending handles are not
/// part of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub scope: String,
}

impl ScopeQueue {
    pub fn new(
        scope: impl Into<String>,
        builder: Arc<BatchBuilder>,
        transport: Arc<dyn BatchTransport>,
    ) -> Self {
        Self {
            id: NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed),
            scope: scope.into(),
            builder,
            transport,
            pending: Mutex::new(Vec::new()),
            sync_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn builder(&self) -> &Arc<BatchBuilder> {
        &self.builder
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Copy of the pending list, in arrival order.
    pub fn pending(&self) -> Vec<RequestHandle> {
        self.pending.lock().clone()
    }

    pub fn append(&self, handle: RequestHandle) {
        debug!(queue = self.id, handle = %handle.id(), "queuing {handle}");
        self.pending.lock().push(handle);
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot { scope: self.scope.clone() }
    }

    /// Send the pending requests in batches until `caller` completes or no
    /// batch makes progress.
    ///
    /// Requests registered while the pass runs (by callbacks or page
    /// prefetching) wait for the next pass. When `caller` is still pending
    /// at the end, it fails with `GraphError::QueueTimedOut`.
    #[instrument(skip_all, fields(queue = self.id, caller = ?caller.map(RequestHandle::id)))]
    pub async fn sync(&self, caller: Option<&RequestHandle>) {
        let _pass = self.sync_lock.lock().await;
        if caller.is_some_and(RequestHandle::is_complete) {
            return;
        }

        let mut collected = std::mem::take(&mut *self.pending.lock());
        if let Some(caller) = caller {
            if !collected.iter().any(|h| h.ptr_eq(caller)) {
                warn!(handle = %caller.id(), "caller was not queued, adding it to this pass");
                collected.push(caller.clone());
            }
        }

        let pairs = self.builder.warm_credentials(&collected);
        debug!(requests = collected.len(), credentials = pairs, "collected pending requests");

        let (uniques, groups) = if self.builder.settings().dedup {
            dedup(collected)
        } else {
            (collected.clone(), DedupGroups::singletons(collected))
        };

        // With dedup on, the caller completes through its representative.
        let focus = caller.map(|c| groups.representative_of(c).unwrap_or_else(|| c.clone()));

        let mut working: Vec<RequestHandle> =
            uniques.iter().filter(|h| !h.is_complete()).cloned().collect();
        let mut progress = 1;

        while !working.is_empty()
            && progress > 0
            && !focus.as_ref().is_some_and(RequestHandle::is_complete)
        {
            let batch = self.builder.prepare_batch(&working);
            if !batch.is_empty() {
                self.send(&batch, working.len()).await;
            }

            let before = working.len();
            working.retain(|h| !h.is_complete());
            progress = before - working.len();

            if batch.is_empty() && progress == 0 {
                error!(pending = working.len(), "batch builder produced no entries, abandoning pass");
                break;
            }
        }

        let settled = redup(&uniques, groups);

        // Only the caller times out; its duplicates stay queued.
        if let (Some(caller), Some(focus)) = (caller, focus.as_ref()) {
            if !focus.is_complete() {
                caller.set_failure(GraphError::QueueTimedOut(
                    "couldn't make enough progress to complete request".into(),
                ));
            }
        }

        let remaining: Vec<RequestHandle> =
            settled.into_iter().filter(|h| !h.is_complete()).collect();

        // Ahead of anything queued during the pass.
        if !remaining.is_empty() {
            debug!(requests = remaining.len(), "requeuing incomplete requests");
            let mut pending = self.pending.lock();
            let queued = std::mem::replace(&mut *pending, remaining);
            pending.extend(queued);
        }
    }

    async fn send(&self, batch: &PreparedBatch, pending: usize) {
        let verbose = self.builder.settings().debug_requests;
        request_log!(verbose, len = batch.len(), pending, queue = self.id, "making batch request");

        let slots = match self.transport.execute(&self.scope, &batch.entries).await {
            Ok(slots) if slots.len() == batch.len() => slots,
            Ok(slots) => {
                let failure = GraphError::Transport(format!(
                    "batch returned {} results for {} requests",
                    slots.len(),
                    batch.len()
                ));
                error!(queue = self.id, error = %failure, "misaligned batch response");
                fail_batch(batch, &failure);
                return;
            }
            Err(failure) => {
                warn!(queue = self.id, error = %failure, "batch request failed");
                fail_batch(batch, &failure);
                return;
            }
        };

        for (handle, slot) in batch.handles.iter().zip(slots) {
            match slot {
                BatchSlot::Completed(raw) => {
                    handle.set_result(raw);
                    request_log!(verbose, handle = %handle.id(), "{handle}");
                }
                BatchSlot::TimedOut => {
                    request_log!(verbose, handle = %handle.id(), "TIMEOUT {handle}");
                }
            }
        }
    }
}

fn fail_batch(batch: &PreparedBatch, failure: &GraphError) {
    for handle in &batch.handles {
        handle.set_failure(failure.clone());
    }
}

impl std::fmt::Debug for ScopeQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeQueue")
            .field("id", &self.id)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
