//! # Graphbatch Core
//!
//! Request batching logic - no HTTP or file-format code.
//!
//! This crate contains:
//! - Lazy request handles with automatic page chaining
//! - Per-scope queues running the dedup/batch/retry loop
//! - Port interfaces (traits) for the batch transport and secret proofs
//! - The [`GraphClient`] facade
//!
//! ## Architecture Principles
//! - Only depends on `graphbatch-domain`
//! - All I/O goes through [`BatchTransport`]
//! - Queues live in an explicit [`QueueRegistry`], never in global state

pub mod batch;
pub mod client;
pub mod handle;
pub mod queue;

#[cfg(test)]
mod test_support;

// Re-export specific items to avoid ambiguity
pub use batch::{BatchBuilder, BatchTransport, DedupKey, PreparedBatch, ProofProvider};
pub use client::{ClientOptions, GraphClient, RequestOptions};
pub use handle::{Callback, HandleId, HandleSnapshot, ItemStream, RequestHandle};
pub use queue::{QueueRegistry, QueueSnapshot, ScopeQueue};
