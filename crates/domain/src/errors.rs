//! Error types used throughout the batching layer
//!
//! `GraphError` is the failure captured on a request handle. It is `Clone` so
//! that one physical result can settle every duplicate of a request, and
//! serializable so completed handles survive a snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Error codes the remote API uses for authentication problems even when the
/// envelope does not carry the `OAuthException` type.
const OAUTH_ERROR_CODES: [i64; 2] = [102, 190];

/// Main error type for graphbatch
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum GraphError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Api(ApiErrorDetails),

    #[error("{0}")]
    OAuth(ApiErrorDetails),

    #[error("Queue timed out: {0}")]
    QueueTimedOut(String),

    #[error("Paging error: {0}")]
    Paging(String),

    #[error("Request canceled")]
    Canceled,

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Callback failed: {0}")]
    Callback(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GraphError {
    /// Wrap a lower-level transport failure, keeping the cause's type name in
    /// the message.
    pub fn transport<E>(cause: E) -> Self
    where
        E: std::error::Error,
    {
        let type_name = std::any::type_name::<E>().rsplit("::").next().unwrap_or("Error");
        Self::Transport(format!("{type_name}: {cause}"))
    }

    /// Build the API-kind failure for a structured error envelope.
    pub fn from_error_envelope(error: &Map<String, Value>) -> Self {
        ApiErrorDetails::from_envelope(error).into_error()
    }

    /// True for the API-kind family (including authentication failures).
    pub fn is_api(&self) -> bool {
        matches!(self, Self::Api(_) | Self::OAuth(_))
    }

    /// The remote error details, when this is an API-kind failure.
    pub fn api_details(&self) -> Option<&ApiErrorDetails> {
        match self {
            Self::Api(details) | Self::OAuth(details) => Some(details),
            _ => None,
        }
    }
}

/// Structured error envelope returned by the remote API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDetails {
    pub code: Option<i64>,
    #[serde(rename = "error_subcode")]
    pub subcode: Option<i64>,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "error_user_title")]
    pub user_title: Option<String>,
    #[serde(rename = "error_user_message")]
    pub user_message: Option<String>,
}

impl ApiErrorDetails {
    /// Details for a plain message with no code.
    pub fn message(message: impl Into<String>) -> Self {
        Self { message: Some(message.into()), ..Self::default() }
    }

    /// Extract details from an `error` mapping. Fields with unexpected types
    /// are ignored rather than rejected.
    pub fn from_envelope(error: &Map<String, Value>) -> Self {
        let int = |key: &str| error.get(key).and_then(as_i64);
        let text = |key: &str| {
            error.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_owned)
        };

        Self {
            code: int("code"),
            subcode: int("error_subcode"),
            error_type: text("type"),
            message: text("message"),
            user_title: text("error_user_title"),
            user_message: text("error_user_message"),
        }
    }

    /// True when the envelope denotes an authentication/authorization error.
    pub fn is_oauth(&self) -> bool {
        self.error_type.as_deref() == Some("OAuthException")
            || self.code.is_some_and(|code| OAUTH_ERROR_CODES.contains(&code))
    }

    pub fn into_error(self) -> GraphError {
        if self.is_oauth() {
            GraphError::OAuth(self)
        } else {
            GraphError::Api(self)
        }
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

impl fmt::Display for ApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.subcode) {
            (Some(code), Some(subcode)) => write!(f, "[{code}.{subcode}] ")?,
            (Some(code), None) => write!(f, "[{code}] ")?,
            _ => {}
        }

        f.write_str(self.message.as_deref().unwrap_or("unknown error"))?;

        let user_message = self.user_message.as_deref().unwrap_or_default();
        let user_title = match self.user_title.as_deref() {
            Some(title) if title == user_message => "",
            Some(title) => title,
            None => "",
        };

        match (user_title.is_empty(), user_message.is_empty()) {
            (false, false) => write!(f, " ({user_title}: {user_message})"),
            (false, true) => write!(f, " ({user_title})"),
            (true, false) => write!(f, " ({user_message})"),
            (true, true) => Ok(()),
        }
    }
}

/// Result type alias for graphbatch operations
pub type Result<T> = std::result::Result<T, GraphError>;
