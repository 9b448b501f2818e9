//! Secret proof attached to authenticated requests.

use graphbatch_core::ProofProvider;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::error;

type HmacSha256 = Hmac<Sha256>;

/// `appsecret_proof`: hex HMAC-SHA256 of the token keyed by the app secret
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacProofProvider;

impl ProofProvider for HmacProofProvider {
    fn proof(&self, secret: &str, token: &str) -> String {
        match HmacSha256::new_from_slice(secret.as_bytes()) {
            Ok(mut mac) => {
                mac.update(token.as_bytes());
                hex::encode(mac.finalize().into_bytes())
            }
            Err(err) => {
                // HMAC takes keys of any length.
                error!(error = %err, "failed to initialize HMAC");
                String::new()
            }
        }
    }
}
