//! Graph batch transport over HTTP
//!
//! One physical call is a single `POST` to the graph root carrying the scope
//! token and the JSON-encoded `batch` array. Entries with attachments turn
//! the call into a multipart upload where each file travels as its own part
//! and is referenced from its entry through `attached_files`.

use async_trait::async_trait;
use graphbatch_core::BatchTransport;
use graphbatch_domain::{BatchEntry, BatchSlot, GraphError, GraphSettings, RawResponse, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::errors::InfraError;
use crate::http::HttpClient;

/// Sends prepared batches to the graph endpoint
#[derive(Debug, Clone)]
pub struct HttpBatchTransport {
    http: HttpClient,
    graph_url: String,
}

/// Operation descriptor as the batch endpoint expects it
#[derive(Debug, Serialize)]
struct WireEntry<'a> {
    method: &'static str,
    relative_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attached_files: Option<String>,
}

/// An attachment waiting to be read into a multipart part
struct Upload<'a> {
    part_name: String,
    entry: &'a BatchEntry,
    param: &'a str,
}

impl HttpBatchTransport {
    pub fn new(http: HttpClient, graph_url: impl Into<String>) -> Self {
        Self { http, graph_url: graph_url.into() }
    }

    /// Transport for the endpoint, timeout and attempt budget of `settings`.
    ///
    /// # Errors
    /// Returns `GraphError::Transport` when the HTTP client cannot be built.
    pub fn from_settings(settings: &GraphSettings) -> Result<Self> {
        Ok(Self::new(HttpClient::from_settings(settings)?, settings.graph_url.clone()))
    }

    pub fn graph_url(&self) -> &str {
        &self.graph_url
    }

    async fn build_request(&self, scope: &str, entries: &[BatchEntry]) -> Result<RequestBuilder> {
        let (wire, uploads) = wire_entries(entries);
        let batch = serde_json::to_string(&wire).map_err(|err| GraphError::from(InfraError::from(err)))?;
        let request = self.http.request(Method::POST, self.graph_url.as_str());

        if uploads.is_empty() {
            return Ok(request.form(&[("access_token", scope), ("batch", batch.as_str())]));
        }

        let mut form = Form::new().text("access_token", scope.to_owned()).text("batch", batch);
        for upload in uploads {
            let Some(file) = upload.entry.files.get(upload.param) else {
                continue;
            };
            let bytes = tokio::fs::read(file.path())
                .await
                .map_err(|err| GraphError::from(InfraError::from(err)))?;
            let file_name = file
                .path()
                .file_name()
                .map_or_else(|| upload.part_name.clone(), |name| name.to_string_lossy().into_owned());
            form = form.part(upload.part_name, Part::bytes(bytes).file_name(file_name));
        }

        Ok(request.multipart(form))
    }
}

#[async_trait]
impl BatchTransport for HttpBatchTransport {
    #[instrument(skip_all, fields(entries = entries.len()))]
    async fn execute(&self, scope: &str, entries: &[BatchEntry]) -> Result<Vec<BatchSlot>> {
        let request = self.build_request(scope, entries).await?;
        // A failed write batch may already have been applied server-side.
        let response = if entries.iter().any(|entry| entry.method != "GET") {
            self.http.send_once(request).await?
        } else {
            self.http.send(request).await?
        };
        let status = response.status();
        let text = response.text().await.map_err(|err| GraphError::from(InfraError::from(err)))?;
        debug!(%status, bytes = text.len(), "batch response received");

        parse_batch_response(status.as_u16(), &text)
    }
}

/// Serializable entries plus the attachments they reference. Part names are
/// numbered across the whole batch.
fn wire_entries(entries: &[BatchEntry]) -> (Vec<WireEntry<'_>>, Vec<Upload<'_>>) {
    let mut uploads = Vec::new();
    let wire = entries
        .iter()
        .map(|entry| {
            let mut names = Vec::with_capacity(entry.files.len());
            for param in entry.files.keys() {
                let part_name = format!("file{}", uploads.len());
                names.push(part_name.clone());
                uploads.push(Upload { part_name, entry, param });
            }

            WireEntry {
                method: entry.method,
                relative_url: &entry.relative_url,
                body: entry.body.as_deref(),
                attached_files: (!names.is_empty()).then(|| names.join(",")),
            }
        })
        .collect();

    (wire, uploads)
}

/// Decode the body of a batch call into one slot per operation.
///
/// `null` elements are operations the server gave up on. A top-level error
/// envelope becomes the API failure it describes; any other unexpected shape
/// is a transport failure.
fn parse_batch_response(status: u16, text: &str) -> Result<Vec<BatchSlot>> {
    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(_) if !(200..300).contains(&status) => {
            return Err(GraphError::Transport(format!("batch call failed with HTTP {status}")));
        }
        Err(err) => return Err(InfraError::from(err).into()),
    };

    match value {
        Value::Array(items) if (200..300).contains(&status) => items.into_iter().map(parse_slot).collect(),
        Value::Object(map) => match map.get("error") {
            Some(Value::Object(error)) => Err(GraphError::from_error_envelope(error)),
            _ => Err(unexpected(status)),
        },
        _ => Err(unexpected(status)),
    }
}

fn parse_slot(item: Value) -> Result<BatchSlot> {
    match item {
        Value::Null => Ok(BatchSlot::TimedOut),
        Value::Object(_) => serde_json::from_value::<RawResponse>(item)
            .map(BatchSlot::Completed)
            .map_err(|err| InfraError::from(err).into()),
        other => {
            warn!(kind = json_kind(&other), "unexpected element in batch response");
            Err(GraphError::Transport(format!(
                "malformed batch response: unexpected {} element",
                json_kind(&other)
            )))
        }
    }
}

fn unexpected(status: u16) -> GraphError {
    if (200..300).contains(&status) {
        GraphError::Transport("malformed batch response: expected a JSON array".into())
    } else {
        GraphError::Transport(format!("batch call failed with HTTP {status}"))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
