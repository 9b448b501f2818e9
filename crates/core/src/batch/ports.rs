//! Port interfaces for batch execution

use async_trait::async_trait;
use graphbatch_domain::{BatchEntry, BatchSlot, Result};

/// Executes one physical batch call against the remote API
///
/// Implementations must return exactly one slot per entry, in entry order.
/// A slot is either the raw result of its operation or
/// [`BatchSlot::TimedOut`], meaning "no result, try again".
#[async_trait]
pub trait BatchTransport: Send + Sync {
    /// Send `entries` as a single batch authenticated with the scope token.
    ///
    /// # Errors
    ///
    /// Returns an error when the physical call itself fails; every operation
    /// in the batch is then settled with that error.
    async fn execute(&self, scope: &str, entries: &[BatchEntry]) -> Result<Vec<BatchSlot>>;
}

/// Computes the secret proof attached to authenticated requests
pub trait ProofProvider: Send + Sync {
    /// Stable proof string for `token` under the shared `secret`.
    fn proof(&self, secret: &str, token: &str) -> String;
}
