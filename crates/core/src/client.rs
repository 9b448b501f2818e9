//! Graph client facade
//!
//! [`GraphClient`] binds a user token and a scope (app) token to a
//! [`QueueRegistry`] and issues requests through the queue of that scope.
//! Reads are deferred until their data is needed; writes are sent at once.

use std::sync::Arc;

use graphbatch_domain::{
    Credentials, GraphError, GraphSettings, Method, Migrations, Params, RequestFlags, RequestSpec,
    Result,
};
use tracing::debug;

use crate::handle::{Callback, RequestHandle};
use crate::queue::QueueRegistry;

/// Defaults applied to every request of a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub api_version: Option<String>,
    pub raise_on_failure: bool,
    pub prefetch_next_page: bool,
    pub summary_info: bool,
    pub migrations: Option<Migrations>,
    pub app_secret: Option<String>,
}

impl ClientOptions {
    pub fn from_settings(settings: &GraphSettings) -> Self {
        Self {
            api_version: settings.api_version.clone(),
            raise_on_failure: true,
            prefetch_next_page: true,
            summary_info: settings.summary_info,
            migrations: settings.migrations.clone(),
            app_secret: settings.app_secret.clone(),
        }
    }
}

/// Per-request options
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub callback: Option<Callback>,
    /// Overrides the method's default: reads defer, writes do not.
    pub defer: Option<bool>,
}

impl RequestOptions {
    pub fn with_callback(callback: Callback) -> Self {
        Self { callback: Some(callback), defer: None }
    }

    pub fn deferred(defer: bool) -> Self {
        Self { callback: None, defer: Some(defer) }
    }
}

/// Issues requests for one user token within one scope
#[derive(Debug, Clone)]
pub struct GraphClient {
    registry: Arc<QueueRegistry>,
    token: Option<String>,
    app_token: String,
    options: ClientOptions,
}

impl GraphClient {
    /// Client with options taken from the registry's settings.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Config` when neither `app_token` nor the
    /// settings provide a scope token.
    pub fn new(
        registry: Arc<QueueRegistry>,
        token: Option<String>,
        app_token: Option<String>,
    ) -> Result<Self> {
        let options = ClientOptions::from_settings(registry.settings());
        Self::with_options(registry, token, app_token, options)
    }

    /// # Errors
    ///
    /// Returns `GraphError::Config` when neither `app_token` nor the
    /// settings provide a scope token.
    pub fn with_options(
        registry: Arc<QueueRegistry>,
        token: Option<String>,
        app_token: Option<String>,
        options: ClientOptions,
    ) -> Result<Self> {
        let app_token = app_token
            .filter(|t| !t.is_empty())
            .or_else(|| registry.settings().app_token.clone().filter(|t| !t.is_empty()))
            .ok_or_else(|| GraphError::Config("either app_token or settings.app_token is required".into()))?;

        Ok(Self { registry, token, app_token, options })
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn app_token(&self) -> &str {
        &self.app_token
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<QueueRegistry> {
        &self.registry
    }

    /// Deferred read.
    ///
    /// # Errors
    ///
    /// Never fails for a deferred request; see [`GraphClient::request`].
    pub async fn get(&self, path: &str, params: Params) -> Result<RequestHandle> {
        self.request(Method::Get, path, params, RequestOptions::default()).await
    }

    /// Immediate write.
    ///
    /// # Errors
    ///
    /// Returns the request's failure when `raise_on_failure` is set.
    pub async fn post(&self, path: &str, params: Params) -> Result<RequestHandle> {
        self.request(Method::Post, path, params, RequestOptions::default()).await
    }

    /// Immediate write.
    ///
    /// # Errors
    ///
    /// Returns the request's failure when `raise_on_failure` is set.
    pub async fn put(&self, path: &str, params: Params) -> Result<RequestHandle> {
        self.request(Method::Put, path, params, RequestOptions::default()).await
    }

    /// Immediate delete.
    ///
    /// # Errors
    ///
    /// Returns the request's failure when `raise_on_failure` is set.
    pub async fn delete(&self, path: &str, params: Params) -> Result<RequestHandle> {
        self.request(Method::Delete, path, params, RequestOptions::default()).await
    }

    /// Deferred inspection of this client's user token.
    ///
    /// # Errors
    ///
    /// Never fails for a deferred request; see [`GraphClient::request`].
    pub async fn debug_token(&self) -> Result<RequestHandle> {
        self.request(Method::DebugToken, "", Params::new(), RequestOptions::default()).await
    }

    /// Register a request on the scope queue. Unless deferred, synchronize
    /// right away with the new request as the caller.
    ///
    /// # Errors
    ///
    /// For a request that is not deferred, returns its failure when
    /// `raise_on_failure` is set.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        params: Params,
        options: RequestOptions,
    ) -> Result<RequestHandle> {
        let defer = options.defer.unwrap_or(matches!(method, Method::Get | Method::DebugToken));
        let handle = self.enqueue(method, path, params, options.callback);

        if !defer {
            handle.sync().await;
            // Writes may never be read back; surface their failure now.
            if let Some(failure) = handle.peek_failure().filter(|_| self.options.raise_on_failure) {
                return Err(failure);
            }
        }

        Ok(handle)
    }

    /// Register a request on the scope queue without synchronizing. Usable
    /// from completion callbacks to chain requests.
    pub fn enqueue(
        &self,
        method: Method,
        path: &str,
        params: Params,
        callback: Option<Callback>,
    ) -> RequestHandle {
        let path = match self.options.api_version.as_deref() {
            Some(version) => format!("{version}/{}", path.trim_start_matches('/')),
            None => path.to_owned(),
        };

        let flags = RequestFlags {
            raise_on_failure: self.options.raise_on_failure,
            prefetch_next_page: self.options.prefetch_next_page,
            summary_info: self.options.summary_info,
            migrations: self.options.migrations.clone(),
        };
        let credentials =
            Credentials { token: self.token.clone(), app_secret: self.options.app_secret.clone() };

        let queue = self.registry.queue(&self.app_token);
        let handle =
            RequestHandle::register(&queue, RequestSpec::new(method, path, params), credentials, flags, callback);
        debug!(handle = %handle.id(), method = %method, "registered request");
        handle
    }
}
