//! Settings consumed read-only by the queue and the batch builder

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_GRAPH_URL, DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT_SECS, MAX_BATCH_SIZE};
use crate::errors::{GraphError, Result};
use crate::types::Migrations;

/// Batching and transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Scope token used when a client does not name one explicitly.
    pub app_token: Option<String>,
    pub app_secret: Option<String>,
    /// Version prefix applied to request paths (e.g. `v19.0`).
    pub api_version: Option<String>,
    pub max_batch_size: usize,
    pub dedup: bool,
    /// Log every physical batch at INFO instead of DEBUG.
    pub debug_requests: bool,
    /// Keep response headers when rendering handles.
    pub debug_headers: bool,
    pub summary_info: bool,
    pub migrations: Option<Migrations>,
    pub graph_url: String,
    pub timeout_secs: u64,
    pub max_attempts: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            app_token: None,
            app_secret: None,
            api_version: None,
            max_batch_size: MAX_BATCH_SIZE,
            dedup: true,
            debug_requests: false,
            debug_headers: false,
            summary_info: false,
            migrations: None,
            graph_url: DEFAULT_GRAPH_URL.to_owned(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl GraphSettings {
    /// Check the settings against the limits of the remote API.
    ///
    /// # Errors
    /// Returns `GraphError::Config` when the batch size is zero or above
    /// [`MAX_BATCH_SIZE`], or when the graph URL is empty.
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 || self.max_batch_size > MAX_BATCH_SIZE {
            return Err(GraphError::Config(format!(
                "max_batch_size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.max_batch_size
            )));
        }

        if self.graph_url.trim().is_empty() {
            return Err(GraphError::Config("graph_url must not be empty".into()));
        }

        Ok(())
    }

    /// Batch size actually used, never above the server limit.
    pub fn effective_batch_size(&self) -> usize {
        self.max_batch_size.clamp(1, MAX_BATCH_SIZE)
    }
}
