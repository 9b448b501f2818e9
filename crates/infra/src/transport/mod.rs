//! Batch transport adapters.

pub mod http;

pub use http::HttpBatchTransport;
