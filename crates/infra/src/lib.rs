//! # Graphbatch Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - The retrying HTTP client (reqwest)
//! - The graph batch transport over HTTP
//! - The HMAC-SHA256 secret proof provider
//! - Settings loading from environment variables and files
//!
//! ## Architecture
//! - Implements traits defined in `graphbatch-core`
//! - Contains all "impure" code (network and file I/O)

pub mod config;
pub mod errors;
pub mod http;
pub mod proof;
pub mod transport;

use std::sync::Arc;

use graphbatch_core::QueueRegistry;
use graphbatch_domain::{GraphSettings, Result};

// Re-export commonly used items
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use proof::HmacProofProvider;
pub use transport::HttpBatchTransport;

/// Registry wired to the HTTP transport and HMAC proofs for `settings`.
///
/// # Errors
/// Returns `GraphError::Config` for invalid settings, or
/// `GraphError::Transport` when the HTTP client cannot be built.
pub fn connect(settings: GraphSettings) -> Result<Arc<QueueRegistry>> {
    let transport = HttpBatchTransport::from_settings(&settings)?;
    let registry = QueueRegistry::new(settings, Arc::new(transport), Arc::new(HmacProofProvider))?;
    Ok(Arc::new(registry))
}
