//! Page chaining
//!
//! A list response may carry a `paging.next` link. The continuation handle
//! for that link is created at most once per handle and registered on the
//! same queue, so paging one list prefetches the next page of every list in
//! the queue.

use std::collections::VecDeque;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use graphbatch_domain::constants::{
    ACCESS_TOKEN_PARAM, APPSECRET_PROOF_PARAM, BOGUS_NEXT_LINK_MARKER, LIMIT_PARAM,
};
use graphbatch_domain::{parse_limit, Credentials, GraphError, Params, RequestFlags, RequestSpec, Result};
use serde_json::Value;
use tracing::debug;

use super::RequestHandle;
use crate::batch::RelativeUrl;

/// Stream of every item of a paged list response
pub type ItemStream = BoxStream<'static, Result<Value>>;

impl RequestHandle {
    /// Create the continuation for the response's `next` link, if the
    /// response warrants one, and return it.
    pub(super) fn prepare_next_page(&self) -> Option<Self> {
        let mut state = self.inner.state.lock();
        if let Some(next) = &state.next_page {
            return Some(next.clone());
        }

        let envelope = state.envelope.as_ref()?;
        let link = envelope.next_link()?;

        // Some endpoints report an unusable link.
        if link.contains(BOGUS_NEXT_LINK_MARKER) {
            return None;
        }

        let target = RelativeUrl::from_link(link);

        // A short page means the link points past the end of the data.
        // A zero limit carries no information; fall through to the link's.
        let limit = envelope.declared_limit().filter(|limit| *limit > 0).or_else(|| {
            target
                .query_value(LIMIT_PARAM)
                .and_then(|v| parse_limit(&Value::from(v)))
                .filter(|limit| *limit > 0)
        });
        if let Some(limit) = limit {
            let returned = u64::try_from(envelope.data_len()).unwrap_or(u64::MAX);
            if returned < limit {
                debug!(handle = %self.inner.id, returned, limit, "short page, not paging further");
                return None;
            }
        }

        let credentials = self.continuation_credentials(&target);
        let queue = self.inner.queue.upgrade()?;
        let request = RequestSpec::new(self.inner.request.method, target.to_string(), Params::new());
        let flags = RequestFlags {
            raise_on_failure: self.inner.flags.raise_on_failure,
            prefetch_next_page: self.inner.flags.prefetch_next_page,
            summary_info: false,
            migrations: self.inner.flags.migrations.clone(),
        };

        let next = Self::register(&queue, request, credentials, flags, None);
        debug!(handle = %self.inner.id, next = %next.id(), "prepared next page");
        state.next_page = Some(next.clone());
        Some(next)
    }

    /// Credentials are carried over only when the link was issued for this
    /// handle's token and does not already carry a proof.
    fn continuation_credentials(&self, target: &RelativeUrl) -> Credentials {
        let own = &self.inner.credentials;
        let inherit = own.app_secret.is_some()
            && target.query_value(APPSECRET_PROOF_PARAM).is_none()
            && target.query_value(ACCESS_TOKEN_PARAM) == own.token.as_deref();

        if inherit {
            own.clone()
        } else {
            Credentials::default()
        }
    }

    /// Stream the items of the current page, then of each following page.
    ///
    /// A mapping response yields its keys and does not page. Paging stops
    /// when no `next` link is offered or a short page is seen. A page whose
    /// data is neither a list nor a mapping records a paging failure on this
    /// handle.
    pub fn items(&self) -> ItemStream {
        let pager = Pager {
            origin: self.clone(),
            current: Some(self.clone()),
            buffered: VecDeque::new(),
            paging: None,
        };
        stream::unfold(pager, Pager::advance).boxed()
    }

    /// Collect every item across all pages.
    ///
    /// # Errors
    ///
    /// Returns the first failure surfaced while paging.
    pub async fn collect_items(&self) -> Result<Vec<Value>> {
        self.items().try_collect().await
    }
}

struct Pager {
    origin: RequestHandle,
    current: Option<RequestHandle>,
    buffered: VecDeque<Value>,
    /// Decided by the shape of the first page.
    paging: Option<bool>,
}

impl Pager {
    async fn advance(mut self) -> Option<(Result<Value>, Self)> {
        loop {
            if let Some(item) = self.buffered.pop_front() {
                return Some((Ok(item), self));
            }

            let page = self.current.take()?;
            let data = match page.data().await {
                Ok(data) => data,
                Err(err) => return Some((Err(err), self)),
            };

            let paging = *self.paging.get_or_insert(!matches!(data, Some(Value::Object(_))));

            match data {
                Some(Value::Array(items)) => self.buffered.extend(items),
                Some(Value::Object(map)) => self.buffered.extend(map.into_iter().map(|(k, _)| Value::String(k))),
                _ => {
                    self.origin.set_failure(GraphError::Paging(format!(
                        "unexpected data while paging {}",
                        page.id()
                    )));
                    return match self.origin.raise_if_failed() {
                        Err(err) => Some((Err(err), self)),
                        Ok(()) => None,
                    };
                }
            }

            if paging {
                self.current = page.next_page().await;
            }
        }
    }
}
