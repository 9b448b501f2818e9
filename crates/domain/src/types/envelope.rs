//! Decoded response envelope
//!
//! The raw transport result is parsed once, its body promoted into the
//! envelope fields (`data`, `error`, `paging`, `summary`, ...), and API-level
//! error shapes normalized into [`GraphError`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::wire::RawResponse;
use crate::errors::{ApiErrorDetails, GraphError};

/// Response envelope of a completed request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Envelope {
    /// Decode a raw result.
    ///
    /// A mapping body containing `data` or `error` is merged into the
    /// envelope, its own `code` and `headers` replacing the transport's; any
    /// other body is wrapped under `data`. A body that is not
    /// valid JSON is kept verbatim under `body` and reported as the second
    /// element.
    pub fn from_raw(raw: RawResponse) -> (Self, Option<GraphError>) {
        let RawResponse { mut code, mut headers, body } = raw;
        let mut fields = Map::new();
        let mut failure = None;

        if let Some(body) = body {
            match serde_json::from_str::<Value>(&body) {
                Ok(Value::Object(mut map))
                    if map.contains_key("data") || map.contains_key("error") =>
                {
                    // `code` and `headers` are typed fields; they must not
                    // reappear among the flattened ones.
                    if let Some(value) = map.remove("code") {
                        code = value.as_u64().and_then(|c| u16::try_from(c).ok());
                    }
                    if let Some(value) = map.remove("headers") {
                        headers = Some(value);
                    }
                    fields.extend(map);
                }
                Ok(other) => {
                    fields.insert("data".to_owned(), other);
                }
                Err(err) => {
                    failure = Some(GraphError::Decode(err.to_string()));
                    fields.insert("body".to_owned(), Value::String(body));
                }
            }
        }

        (Self { code, headers, fields }, failure)
    }

    /// The API-level failure embedded in this envelope, if any.
    pub fn api_failure(&self) -> Option<GraphError> {
        match self.fields.get("error") {
            Some(Value::Object(error)) => return Some(GraphError::from_error_envelope(error)),
            Some(Value::String(message)) => {
                return Some(ApiErrorDetails::message(message.clone()).into_error())
            }
            _ => {}
        }

        if self.fields.get("data") == Some(&Value::Bool(false)) {
            return Some(GraphError::Api(ApiErrorDetails::message("Graph API returned false")));
        }

        None
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn data(&self) -> Option<&Value> {
        self.fields.get("data")
    }

    pub fn error(&self) -> Option<&Value> {
        self.fields.get("error")
    }

    /// The `paging.next` link, if the server offered one.
    pub fn next_link(&self) -> Option<&str> {
        self.fields.get("paging")?.get("next")?.as_str()
    }

    /// Page-size limit declared at the envelope level, as a number or a
    /// numeric string.
    pub fn declared_limit(&self) -> Option<u64> {
        parse_limit(self.fields.get("limit")?)
    }

    /// `summary.total_count` when the server reported an integer.
    pub fn total_count(&self) -> Option<u64> {
        self.fields.get("summary")?.get("total_count")?.as_u64()
    }

    /// Number of items in the current page of `data`.
    pub fn data_len(&self) -> usize {
        match self.data() {
            Some(Value::Array(items)) => items.len(),
            Some(Value::Object(map)) => map.len(),
            _ => 0,
        }
    }
}

/// Parse a page-size limit given as a number or a numeric string.
pub fn parse_limit(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
