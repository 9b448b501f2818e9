//! Shared helpers for `graphbatch-infra` integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use graphbatch_core::{GraphClient, QueueRegistry};
use graphbatch_domain::GraphSettings;
use serde_json::{json, Value};
use wiremock::{MockServer, Request, ResponseTemplate};

/// Settings pointing the transport at `server`, with a single HTTP attempt.
pub fn settings_for(server: &MockServer) -> GraphSettings {
    GraphSettings {
        app_token: Some("app|token".into()),
        graph_url: server.uri(),
        max_attempts: 1,
        timeout_secs: 5,
        ..GraphSettings::default()
    }
}

pub fn registry_for(server: &MockServer) -> Arc<QueueRegistry> {
    graphbatch_infra::connect(settings_for(server)).expect("registry")
}

/// Client with user token `user-token` on the settings' scope.
pub fn client(registry: &Arc<QueueRegistry>) -> GraphClient {
    GraphClient::new(Arc::clone(registry), Some("user-token".into()), None).expect("client")
}

/// Value of a form field in an urlencoded request body.
pub fn form_field(request: &Request, name: &str) -> Option<String> {
    url::form_urlencoded::parse(&request.body)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// The decoded `batch` field of an urlencoded batch call.
pub fn batch_entries(request: &Request) -> Vec<Value> {
    let batch = form_field(request, "batch").expect("batch field");
    serde_json::from_str(&batch).expect("batch json")
}

/// One completed operation with `body` as its JSON payload.
pub fn slot(body: &Value) -> Value {
    json!({"code": 200, "headers": [{"name": "Content-Type", "value": "text/javascript"}], "body": body.to_string()})
}

/// Response answering every entry of the batch through `answer`.
pub fn answer_each<F>(request: &Request, answer: F) -> ResponseTemplate
where
    F: Fn(&Value) -> Value,
{
    let slots: Vec<Value> = batch_entries(request).iter().map(answer).collect();
    ResponseTemplate::new(200).set_body_json(slots)
}

/// Install a test subscriber so `RUST_LOG` shows transport logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
