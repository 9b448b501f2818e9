//! Conversions from external infrastructure errors into domain errors.

use std::io::Error as IoError;

use graphbatch_domain::GraphError;
use reqwest::Error as HttpError;
use serde_json::Error as JsonError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub GraphError);

impl From<InfraError> for GraphError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<GraphError> for InfraError {
    fn from(value: GraphError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoGraphError {
    fn into_graph(self) -> GraphError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → GraphError */
/* -------------------------------------------------------------------------- */

impl IntoGraphError for HttpError {
    fn into_graph(self) -> GraphError {
        if self.is_timeout() {
            return GraphError::Transport(format!("HTTP request timed out: {self}"));
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return GraphError::Transport(format!("HTTP connection failure: {self}"));
        }

        if let Some(status) = self.status() {
            return GraphError::Transport(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status")
            ));
        }

        if self.is_decode() {
            return GraphError::Transport(format!("malformed batch response: {self}"));
        }

        GraphError::transport(self)
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_graph())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → GraphError */
/* -------------------------------------------------------------------------- */

impl IntoGraphError for JsonError {
    fn into_graph(self) -> GraphError {
        GraphError::Transport(format!("malformed batch response: {self}"))
    }
}

impl From<JsonError> for InfraError {
    fn from(value: JsonError) -> Self {
        InfraError(value.into_graph())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → GraphError */
/* -------------------------------------------------------------------------- */

impl IntoGraphError for IoError {
    fn into_graph(self) -> GraphError {
        GraphError::transport(self)
    }
}

impl From<IoError> for InfraError {
    fn from(value: IoError) -> Self {
        InfraError(value.into_graph())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
