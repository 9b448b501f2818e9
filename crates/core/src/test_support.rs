//! Fixtures shared by the unit tests of this crate.

use std::sync::Arc;

use async_trait::async_trait;
use graphbatch_domain::{BatchEntry, BatchSlot, GraphSettings, Result};

use crate::batch::{BatchBuilder, BatchTransport, ProofProvider};
use crate::queue::ScopeQueue;

/// Transport on which every operation times out.
pub struct TimeoutTransport;

#[async_trait]
impl BatchTransport for TimeoutTransport {
    async fn execute(&self, _scope: &str, entries: &[BatchEntry]) -> Result<Vec<BatchSlot>> {
        Ok(vec![BatchSlot::TimedOut; entries.len()])
    }
}

/// Proof provider that concatenates secret and token.
pub struct PlainProof;

impl ProofProvider for PlainProof {
    fn proof(&self, secret: &str, token: &str) -> String {
        format!("{secret}{token}")
    }
}

/// Standalone queue with default settings and a timing-out transport.
pub fn queue(scope: &str) -> Arc<ScopeQueue> {
    let builder = Arc::new(BatchBuilder::new(Arc::new(GraphSettings::default()), Arc::new(PlainProof)));
    Arc::new(ScopeQueue::new(scope, builder, Arc::new(TimeoutTransport)))
}
