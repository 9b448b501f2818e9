//! Wire-level types exchanged with the batch transport

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::request::FileAttachment;

/// One operation descriptor inside a physical batch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub method: &'static str,
    pub relative_url: String,
    /// Urlencoded body of write requests.
    pub body: Option<String>,
    /// Binary payloads keyed by parameter name.
    pub files: BTreeMap<String, FileAttachment>,
}

impl BatchEntry {
    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }
}

/// Raw per-operation result as returned inside a batch response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawResponse {
    pub code: Option<u16>,
    pub headers: Option<Value>,
    pub body: Option<String>,
}

impl RawResponse {
    /// A response with a status code and a textual body.
    pub fn new(code: u16, body: impl Into<String>) -> Self {
        Self { code: Some(code), headers: None, body: Some(body.into()) }
    }

    /// A 200 response whose body is the JSON text of `value`.
    pub fn json(value: &Value) -> Self {
        Self::new(200, value.to_string())
    }
}

/// Outcome of one operation slot in a batch call
#[derive(Debug, Clone, PartialEq)]
pub enum BatchSlot {
    Completed(RawResponse),
    /// The server gave up on this operation; it may be retried.
    TimedOut,
}

impl BatchSlot {
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

impl From<Option<RawResponse>> for BatchSlot {
    fn from(value: Option<RawResponse>) -> Self {
        value.map_or(Self::TimedOut, Self::Completed)
    }
}
