//! # Graphbatch Domain
//!
//! Data types shared by the batching core and its adapters.
//!
//! This crate contains:
//! - Request descriptors, wire entries and response envelopes
//! - The per-request failure taxonomy ([`GraphError`])
//! - Settings and API limits
//!
//! ## Architecture
//! - No dependencies on other graphbatch crates
//! - No I/O beyond stat'ing attached files for their identity

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
