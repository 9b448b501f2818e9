//! HTTP plumbing shared by the graph adapters.

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
