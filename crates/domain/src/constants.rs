//! Domain constants
//!
//! Limits and well-known names imposed by the remote graph API.

/// Hard limit on operations coalesced into one physical batch call.
pub const MAX_BATCH_SIZE: usize = 50;

pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

// Query parameters applied while resolving a request target
pub const ACCESS_TOKEN_PARAM: &str = "access_token";
pub const APPSECRET_PROOF_PARAM: &str = "appsecret_proof";
pub const INPUT_TOKEN_PARAM: &str = "input_token";
pub const SUMMARY_PARAM: &str = "summary";
pub const MIGRATIONS_PARAM: &str = "migrations_override";
pub const LIMIT_PARAM: &str = "limit";

/// Path of the token introspection endpoint.
pub const DEBUG_TOKEN_PATH: &str = "debug_token";

/// Substring of "next" links the server emits but which cannot be followed.
pub const BOGUS_NEXT_LINK_MARKER: &str = "/server.php";
