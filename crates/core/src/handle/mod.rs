//! Request handles
//!
//! A [`RequestHandle`] is one lazily-evaluated logical request. It registers
//! itself on the queue of its scope when created and stays pending until a
//! synchronization pass settles it with a response envelope or a failure.
//! Settling happens at most once.
//!
//! Reads come in two flavours: `peek_*` accessors never trigger I/O, while
//! the async accessors ([`RequestHandle::result`], [`RequestHandle::data`],
//! ...) synchronize the owning queue first.

mod paging;
mod snapshot;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use graphbatch_domain::{
    BatchEntry, Credentials, Envelope, GraphError, Method, Params, RawResponse, RequestFlags,
    RequestSpec, Result,
};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::debug;

pub use self::paging::ItemStream;
pub use self::snapshot::HandleSnapshot;
use crate::batch::{BatchBuilder, DedupKey};
use crate::queue::ScopeQueue;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a handle, used in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    fn next() -> Self {
        Self(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Completion callback, invoked once with the handle right after its
/// response is ingested. An error becomes the handle's failure unless one is
/// already set.
pub type Callback = Arc<dyn Fn(&RequestHandle) -> Result<()> + Send + Sync>;

#[derive(Default)]
struct HandleState {
    envelope: Option<Envelope>,
    failure: Option<GraphError>,
    /// The failure came from this handle's own callback.
    callback_failed: bool,
    next_page: Option<RequestHandle>,
}

impl HandleState {
    fn is_complete(&self) -> bool {
        self.envelope.is_some() || self.failure.is_some()
    }
}

struct HandleInner {
    id: HandleId,
    scope: String,
    request: RequestSpec,
    credentials: Credentials,
    flags: RequestFlags,
    builder: Arc<BatchBuilder>,
    queue: Weak<ScopeQueue>,
    callback: Mutex<Option<Callback>>,
    state: Mutex<HandleState>,
}

/// Shared reference to one logical request
///
/// Clones refer to the same request; use [`RequestHandle::ptr_eq`] for
/// identity and `==` for request equality.
#[derive(Clone)]
pub struct RequestHandle {
    inner: Arc<HandleInner>,
}

impl RequestHandle {
    /// Create a pending handle and append it to `queue`.
    pub fn register(
        queue: &Arc<ScopeQueue>,
        request: RequestSpec,
        credentials: Credentials,
        flags: RequestFlags,
        callback: Option<Callback>,
    ) -> Self {
        let handle = Self::detached(queue, request, credentials, flags, callback);
        queue.append(handle.clone());
        handle
    }

    fn detached(
        queue: &Arc<ScopeQueue>,
        request: RequestSpec,
        credentials: Credentials,
        flags: RequestFlags,
        callback: Option<Callback>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: HandleId::next(),
                scope: queue.scope().to_owned(),
                request,
                credentials,
                flags,
                builder: Arc::clone(queue.builder()),
                queue: Arc::downgrade(queue),
                callback: Mutex::new(callback),
                state: Mutex::new(HandleState::default()),
            }),
        }
    }

    pub fn id(&self) -> HandleId {
        self.inner.id
    }

    /// Scope token of the queue this handle belongs to.
    pub fn scope(&self) -> &str {
        &self.inner.scope
    }

    pub fn method(&self) -> Method {
        self.inner.request.method
    }

    pub fn path(&self) -> &str {
        &self.inner.request.path
    }

    pub fn params(&self) -> &Params {
        &self.inner.request.params
    }

    pub fn request(&self) -> &RequestSpec {
        &self.inner.request
    }

    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    pub fn flags(&self) -> &RequestFlags {
        &self.inner.flags
    }

    /// True when both values refer to the same handle.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// True once a response or a failure has been set.
    pub fn is_complete(&self) -> bool {
        self.inner.state.lock().is_complete()
    }

    /// The response envelope, without synchronizing.
    pub fn peek_response(&self) -> Option<Envelope> {
        self.inner.state.lock().envelope.clone()
    }

    /// The captured failure, without synchronizing.
    pub fn peek_failure(&self) -> Option<GraphError> {
        self.inner.state.lock().failure.clone()
    }

    /// The prepared continuation, without synchronizing.
    pub fn peek_next_page(&self) -> Option<Self> {
        self.inner.state.lock().next_page.clone()
    }

    /// Resolve this request into its wire-level batch entry.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::InvalidRequest` when the request cannot be sent.
    pub fn batch_entry(&self) -> Result<BatchEntry> {
        let inner = &self.inner;
        inner.builder.build_entry(&inner.request, &inner.credentials, &inner.flags)
    }

    /// Canonical key used to group identical requests.
    ///
    /// # Errors
    ///
    /// Fails when the batch entry cannot be built.
    pub fn dedup_key(&self) -> Result<DedupKey> {
        let entry = self.batch_entry()?;
        Ok(DedupKey {
            method: entry.method,
            files: entry.files.iter().map(|(name, file)| (name.clone(), file.fingerprint())).collect(),
            relative_url: entry.relative_url,
            body: entry.body,
            raise_on_failure: self.inner.flags.raise_on_failure,
            completed: self.is_complete(),
        })
    }

    /// Ingest the raw transport result for this request.
    ///
    /// The body is decoded into the envelope, an embedded API error becomes
    /// the failure, then the callback runs and the next page is prepared.
    /// Ignored when the handle is already complete.
    pub fn set_result(&self, raw: RawResponse) {
        let (envelope, decode_failure) = Envelope::from_raw(raw);
        let failure = decode_failure.or_else(|| envelope.api_failure());
        self.settle(envelope, failure);
    }

    /// Record `failure` unless a failure is already set.
    pub fn set_failure(&self, failure: GraphError) {
        let mut state = self.inner.state.lock();
        if state.failure.is_none() {
            debug!(handle = %self.inner.id, error = %failure, "request failed");
            state.failure = Some(failure);
        }
    }

    /// Complete this handle with the outcome of `representative`, an
    /// identical request that was actually sent.
    ///
    /// The representative's own callback failure is not copied; this
    /// handle runs its own callback instead.
    pub fn adopt_result(&self, representative: &Self) {
        let (envelope, failure) = {
            let state = representative.inner.state.lock();
            let failure = if state.callback_failed { None } else { state.failure.clone() };
            (state.envelope.clone(), failure)
        };

        match (envelope, failure) {
            (Some(envelope), failure) => self.settle(envelope, failure),
            (None, Some(failure)) => self.set_failure(failure),
            (None, None) => {}
        }
    }

    fn settle(&self, envelope: Envelope, failure: Option<GraphError>) {
        {
            let mut state = self.inner.state.lock();
            if state.is_complete() {
                debug!(handle = %self.inner.id, "ignoring result for completed request");
                return;
            }
            state.envelope = Some(envelope);
            state.failure = failure;
        }

        self.run_callback();

        // Prefetch even after a soft failure so paging is not silently cut.
        if self.inner.flags.prefetch_next_page {
            self.prepare_next_page();
        }
    }

    fn run_callback(&self) {
        let Some(callback) = self.inner.callback.lock().clone() else {
            return;
        };

        if let Err(err) = callback(self) {
            let mut state = self.inner.state.lock();
            if state.failure.is_none() {
                debug!(handle = %self.inner.id, error = %err, "callback failed");
                state.failure = Some(err);
                state.callback_failed = true;
            }
        }
    }

    /// Force-complete a pending handle with [`GraphError::Canceled`]. Does
    /// not abort a physical call already in flight.
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock();
        if state.is_complete() {
            return;
        }
        debug!(handle = %self.inner.id, "canceled");
        state.failure = Some(GraphError::Canceled);
    }

    /// Synchronize the owning queue until this handle completes or no more
    /// progress is possible.
    pub async fn sync(&self) {
        if self.is_complete() {
            return;
        }

        match self.inner.queue.upgrade() {
            Some(queue) => queue.sync(Some(self)).await,
            None => self.set_failure(GraphError::QueueTimedOut(
                "queue for this scope was reset before the request completed".into(),
            )),
        }
    }

    fn raise_if_failed(&self) -> Result<()> {
        if !self.inner.flags.raise_on_failure {
            return Ok(());
        }
        match self.peek_failure() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    /// Synchronize, then surface the failure if this handle raises.
    ///
    /// Useful for handles with a callback, to force the callback to run.
    ///
    /// # Errors
    ///
    /// Returns the captured failure when `raise_on_failure` is set.
    pub async fn resolve(&self) -> Result<()> {
        self.sync().await;
        self.raise_if_failed()
    }

    /// The response envelope.
    ///
    /// # Errors
    ///
    /// Returns the captured failure when `raise_on_failure` is set.
    pub async fn result(&self) -> Result<Option<Envelope>> {
        self.resolve().await?;
        Ok(self.peek_response())
    }

    /// The `data` payload of the response; only the current page for lists.
    ///
    /// # Errors
    ///
    /// Returns the captured failure when `raise_on_failure` is set.
    pub async fn data(&self) -> Result<Option<Value>> {
        Ok(self.result().await?.and_then(|envelope| envelope.data().cloned()))
    }

    /// The `error` field of the response.
    ///
    /// # Errors
    ///
    /// Returns the captured failure when `raise_on_failure` is set.
    pub async fn error(&self) -> Result<Option<Value>> {
        Ok(self.result().await?.and_then(|envelope| envelope.error().cloned()))
    }

    /// Synchronize and return the captured failure without raising it.
    pub async fn failure(&self) -> Option<GraphError> {
        self.sync().await;
        self.peek_failure()
    }

    /// Server-reported `summary.total_count`, or the length of the current
    /// page when the server did not report one.
    ///
    /// # Errors
    ///
    /// Returns the captured failure when `raise_on_failure` is set.
    pub async fn total_count(&self) -> Result<usize> {
        let Some(envelope) = self.result().await? else {
            return Ok(0);
        };

        if let Some(count) = envelope.total_count().and_then(|c| usize::try_from(c).ok()) {
            return Ok(count);
        }
        if self.inner.flags.summary_info {
            debug!(handle = %self.inner.id, summary = ?envelope.get("summary"), "summary requested but missing");
        }
        Ok(envelope.data_len())
    }

    /// Item `index` of a list response. Indexes past the current page walk
    /// the following pages.
    ///
    /// # Errors
    ///
    /// Returns the captured failure when `raise_on_failure` is set, or a
    /// paging failure hit while walking pages.
    pub async fn item(&self, index: usize) -> Result<Option<Value>> {
        match self.data().await? {
            Some(Value::Array(items)) if index < items.len() => Ok(items.into_iter().nth(index)),
            Some(Value::Array(_)) => Ok(self.collect_items().await?.into_iter().nth(index)),
            _ => Ok(None),
        }
    }

    /// Field `key` of a mapping response.
    ///
    /// # Errors
    ///
    /// Returns the captured failure when `raise_on_failure` is set.
    pub async fn field(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.data().await?.and_then(|data| match data {
            Value::Object(mut map) => map.remove(key),
            _ => None,
        }))
    }

    /// Synchronize and return the continuation handle, if there is one.
    pub async fn next_page(&self) -> Option<Self> {
        self.sync().await;
        self.prepare_next_page()
    }

    fn render_response(&self, envelope: &Envelope) -> String {
        let mut envelope = envelope.clone();
        if envelope.code == Some(200) && !self.inner.builder.settings().debug_headers {
            envelope.headers = None;
        }
        serde_json::to_string(&envelope).unwrap_or_else(|_| "<unprintable>".into())
    }
}

fn render_params(params: &Params) -> String {
    let rendered: Map<String, Value> = params
        .iter()
        .map(|(key, value)| {
            let text = match value.as_file() {
                Some(file) => format!("<file {}>", file.path().display()),
                None => value.encode().unwrap_or_default(),
            };
            (key.clone(), Value::String(text))
        })
        .collect();
    Value::Object(rendered).to_string()
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let response = self.peek_response().map(|envelope| self.render_response(&envelope));
        write!(
            f,
            "{} {} data={} response={}",
            self.inner.request.method,
            self.inner.request.path,
            render_params(&self.inner.request.params),
            response.as_deref().unwrap_or("pending")
        )
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RequestHandle")
            .field("id", &self.inner.id)
            .field("method", &self.inner.request.method)
            .field("path", &self.inner.request.path)
            .field("complete", &state.is_complete())
            .field("failure", &state.failure)
            .finish_non_exhaustive()
    }
}

/// Request equality: same canonical request, raise flag and completion
/// status.
impl PartialEq for RequestHandle {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (self.dedup_key(), other.dedup_key()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}
