//! Handle persistence

use std::sync::Arc;

use graphbatch_domain::{Credentials, Envelope, GraphError, RequestFlags, RequestSpec, Result};
use serde::{Deserialize, Serialize};

use super::{HandleState, RequestHandle};
use crate::queue::ScopeQueue;

/// Serializable state of a pending or completed handle
///
/// Callbacks are not part of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleSnapshot {
    pub scope: String,
    pub request: RequestSpec,
    #[serde(default)]
    pub credentials: Credentials,
    pub flags: RequestFlags,
    #[serde(default)]
    pub envelope: Option<Envelope>,
    #[serde(default)]
    pub failure: Option<GraphError>,
    #[serde(default)]
    pub callback_failed: bool,
    #[serde(default)]
    pub next_page: Option<Box<HandleSnapshot>>,
}

impl RequestHandle {
    /// Capture this handle, and its prepared next page, for persistence.
    ///
    /// A completed handle drops its callback first.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Snapshot` for a pending handle with a callback.
    pub fn snapshot(&self) -> Result<HandleSnapshot> {
        let (envelope, failure, callback_failed, next_page) = {
            let state = self.inner.state.lock();
            let mut callback = self.inner.callback.lock();
            if callback.is_some() {
                if !state.is_complete() {
                    return Err(GraphError::Snapshot(format!(
                        "can't snapshot pending request {} with a callback",
                        self.inner.id
                    )));
                }
                *callback = None;
            }
            (state.envelope.clone(), state.failure.clone(), state.callback_failed, state.next_page.clone())
        };

        let next_page = next_page.map(|next| next.snapshot().map(Box::new)).transpose()?;

        Ok(HandleSnapshot {
            scope: self.inner.scope.clone(),
            request: self.inner.request.clone(),
            credentials: self.inner.credentials.clone(),
            flags: self.inner.flags.clone(),
            envelope,
            failure,
            callback_failed,
            next_page,
        })
    }

    /// Rebuild a handle from `snapshot` and register it, and its next page,
    /// on `queue`. A completed handle is registered too; synchronization
    /// skips it.
    pub fn restore(queue: &Arc<ScopeQueue>, snapshot: HandleSnapshot) -> Self {
        let HandleSnapshot {
            scope: _,
            request,
            credentials,
            flags,
            envelope,
            failure,
            callback_failed,
            next_page,
        } = snapshot;

        let next_page = next_page.map(|next| Self::restore(queue, *next));

        let handle = Self::detached(queue, request, credentials, flags, None);
        *handle.inner.state.lock() = HandleState { envelope, failure, callback_failed, next_page };
        queue.append(handle.clone());
        handle
    }
}
