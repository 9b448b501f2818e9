//! Settings loading
//!
//! Resolves [`GraphSettings`](graphbatch_domain::GraphSettings) from
//! environment variables or from a settings file.

pub mod loader;

// Re-export commonly used items
pub use loader::{find_config_path, load, load_from_env, load_from_file};
