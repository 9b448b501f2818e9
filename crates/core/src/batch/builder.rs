//! Batch builder
//!
//! Resolves request handles into wire-level batch entries, at most
//! `max_batch_size` per physical call.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use graphbatch_domain::constants::{
    ACCESS_TOKEN_PARAM, APPSECRET_PROOF_PARAM, DEBUG_TOKEN_PATH, INPUT_TOKEN_PARAM,
    MIGRATIONS_PARAM, SUMMARY_PARAM,
};
use graphbatch_domain::{
    BatchEntry, Credentials, GraphError, GraphSettings, Method, Params, RequestFlags, RequestSpec,
    Result,
};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::ports::ProofProvider;
use super::target::{encode_pairs, RelativeUrl};
use crate::handle::RequestHandle;

type ProofKey = (String, String);

/// Handles included in one physical call and their index-aligned entries
#[derive(Debug, Default)]
pub struct PreparedBatch {
    pub handles: Vec<RequestHandle>,
    pub entries: Vec<BatchEntry>,
}

impl PreparedBatch {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Turns request identity into batch entries
pub struct BatchBuilder {
    settings: Arc<GraphSettings>,
    proofs: Arc<dyn ProofProvider>,
    proof_cache: Mutex<HashMap<ProofKey, String>>,
}

impl BatchBuilder {
    pub fn new(settings: Arc<GraphSettings>, proofs: Arc<dyn ProofProvider>) -> Self {
        Self { settings, proofs, proof_cache: Mutex::new(HashMap::new()) }
    }

    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    pub fn max_batch_size(&self) -> usize {
        self.settings.effective_batch_size()
    }

    /// Compute the secret proofs for every distinct (secret, token) pair in
    /// `handles` once, ahead of a synchronization pass. Returns the number of
    /// distinct pairs.
    pub fn warm_credentials(&self, handles: &[RequestHandle]) -> usize {
        let mut warmed: HashMap<ProofKey, String> = HashMap::new();
        let previous = std::mem::take(&mut *self.proof_cache.lock());

        for handle in handles {
            let Credentials { token: Some(token), app_secret: Some(secret) } = handle.credentials()
            else {
                continue;
            };
            let key = (secret.clone(), token.clone());
            if warmed.contains_key(&key) {
                continue;
            }
            let proof = previous
                .get(&key)
                .cloned()
                .unwrap_or_else(|| self.proofs.proof(secret, token));
            warmed.insert(key, proof);
        }

        let count = warmed.len();
        *self.proof_cache.lock() = warmed;
        count
    }

    fn proof_for(&self, secret: &str, token: &str) -> String {
        let cached = self.proof_cache.lock().get(&(secret.to_owned(), token.to_owned())).cloned();
        cached.unwrap_or_else(|| self.proofs.proof(secret, token))
    }

    /// Resolve one request into its batch entry.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::InvalidRequest` for token debugging without a
    /// token.
    pub fn build_entry(
        &self,
        request: &RequestSpec,
        credentials: &Credentials,
        flags: &RequestFlags,
    ) -> Result<BatchEntry> {
        let mut target = match request.method {
            Method::DebugToken => {
                // The token under inspection travels as input_token, never as
                // access_token.
                let token = credentials.token.as_deref().ok_or_else(|| {
                    GraphError::InvalidRequest("can't debug_token without a token".into())
                })?;
                let path = match self.settings.api_version.as_deref() {
                    Some(version) => format!("{version}/{DEBUG_TOKEN_PATH}"),
                    None => DEBUG_TOKEN_PATH.to_owned(),
                };
                let mut target = RelativeUrl::parse(&path);
                target.set(INPUT_TOKEN_PARAM, token);
                target
            }
            _ => {
                let mut target = RelativeUrl::parse(&request.path);
                if let Some(token) = credentials.token.as_deref() {
                    target.set(ACCESS_TOKEN_PARAM, token);
                    if let Some(secret) = credentials.app_secret.as_deref() {
                        target.set(APPSECRET_PROOF_PARAM, self.proof_for(secret, token));
                    }
                }
                target
            }
        };

        if !request.method.carries_body() {
            target.set_all(encode_params(&request.params));
        }

        if flags.summary_info {
            target.set(SUMMARY_PARAM, "true");
        }

        if let Some(migrations) = flags.migrations.as_ref().filter(|m| !m.is_empty()) {
            let encoded = serde_json::to_string(migrations)
                .map_err(|e| GraphError::InvalidRequest(format!("bad migrations: {e}")))?;
            target.set(MIGRATIONS_PARAM, encoded);
        }

        let mut entry = BatchEntry {
            method: request.method.wire_verb(),
            relative_url: target.to_string(),
            body: None,
            files: BTreeMap::new(),
        };

        if request.method.carries_body() {
            let fields = encode_params(&request.params);
            if !fields.is_empty() {
                entry.body =
                    Some(encode_pairs(fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))));
            }
            entry.files = request
                .params
                .iter()
                .filter_map(|(name, value)| Some((name.clone(), value.as_file()?.clone())))
                .collect();
        }

        Ok(entry)
    }

    /// Build entries for up to `max_batch_size` handles from the front of
    /// `handles`.
    ///
    /// Handles that cannot be resolved are settled with the resolution
    /// failure and left out, so the returned lists stay index-aligned.
    pub fn prepare_batch(&self, handles: &[RequestHandle]) -> PreparedBatch {
        let mut batch = PreparedBatch::default();

        for handle in handles.iter().take(self.max_batch_size()) {
            if handle.is_complete() {
                continue;
            }
            match handle.batch_entry() {
                Ok(entry) => {
                    batch.handles.push(handle.clone());
                    batch.entries.push(entry);
                }
                Err(err) => {
                    warn!(handle = %handle.id(), error = %err, "dropping request from batch");
                    handle.set_failure(err);
                }
            }
        }

        debug!(entries = batch.len(), candidates = handles.len(), "prepared batch");
        batch
    }
}

/// Key-sorted textual encoding of the non-file parameters.
fn encode_params(params: &Params) -> Vec<(String, String)> {
    params.iter().filter_map(|(key, value)| Some((key.clone(), value.encode()?))).collect()
}
