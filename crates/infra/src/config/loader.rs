//! Settings loader
//!
//! Loads batching settings from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `GRAPHBATCH_APP_TOKEN` is missing, falls back to loading from file
//! 3. Probes multiple paths for settings files
//! 4. Supports JSON and TOML formats
//!
//! Loaded settings are validated before they are returned.
//!
//! ## Environment Variables
//! - `GRAPHBATCH_APP_TOKEN`: Default scope token (required)
//! - `GRAPHBATCH_APP_SECRET`: Secret used for `appsecret_proof`
//! - `GRAPHBATCH_API_VERSION`: Version prefix for request paths
//! - `GRAPHBATCH_MAX_BATCH_SIZE`: Operations per physical call (1-50)
//! - `GRAPHBATCH_DEDUP`: Whether identical requests are coalesced
//! - `GRAPHBATCH_DEBUG_REQUESTS`: Log every batch at INFO
//! - `GRAPHBATCH_DEBUG_HEADERS`: Keep response headers when rendering
//! - `GRAPHBATCH_SUMMARY_INFO`: Request `summary=true` on reads
//! - `GRAPHBATCH_MIGRATIONS`: JSON object of migration name to bool
//! - `GRAPHBATCH_GRAPH_URL`: Batch endpoint
//! - `GRAPHBATCH_TIMEOUT_SECS`: HTTP timeout in seconds
//! - `GRAPHBATCH_MAX_ATTEMPTS`: HTTP attempts per batch call
//!
//! ## File Locations
//! The loader checks the following paths (in order):
//! 1. `./graphbatch.json` or `./graphbatch.toml` (current working directory)
//! 2. `./config.json` or `./config.toml` (current working directory)
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use graphbatch_domain::{GraphError, GraphSettings, Migrations, Result};

const FILE_STEMS: [&str; 2] = ["graphbatch", "config"];
const FILE_EXTENSIONS: [&str; 2] = ["json", "toml"];

/// Load settings with automatic fallback strategy
///
/// First attempts to load from environment variables. If the required
/// variable is missing, falls back to loading from a settings file.
///
/// # Errors
/// Returns `GraphError::Config` if:
/// - Settings cannot be loaded from either source
/// - File format is invalid
/// - The loaded settings fail validation
pub fn load() -> Result<GraphSettings> {
    match load_from_env() {
        Ok(settings) => {
            tracing::info!("Settings loaded from environment variables");
            Ok(settings)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load settings from environment variables
///
/// Only `GRAPHBATCH_APP_TOKEN` is required; every other variable falls back
/// to the [`GraphSettings`] default.
///
/// # Errors
/// Returns `GraphError::Config` if the required variable is missing, a
/// value cannot be parsed, or the result fails validation.
pub fn load_from_env() -> Result<GraphSettings> {
    let defaults = GraphSettings::default();

    let migrations = env_opt("GRAPHBATCH_MIGRATIONS")
        .map(|raw| {
            serde_json::from_str::<Migrations>(&raw)
                .map_err(|e| GraphError::Config(format!("Invalid migrations: {}", e)))
        })
        .transpose()?;

    let settings = GraphSettings {
        app_token: Some(env_var("GRAPHBATCH_APP_TOKEN")?),
        app_secret: env_opt("GRAPHBATCH_APP_SECRET"),
        api_version: env_opt("GRAPHBATCH_API_VERSION"),
        max_batch_size: env_parse("GRAPHBATCH_MAX_BATCH_SIZE", defaults.max_batch_size)?,
        dedup: env_bool("GRAPHBATCH_DEDUP", defaults.dedup),
        debug_requests: env_bool("GRAPHBATCH_DEBUG_REQUESTS", defaults.debug_requests),
        debug_headers: env_bool("GRAPHBATCH_DEBUG_HEADERS", defaults.debug_headers),
        summary_info: env_bool("GRAPHBATCH_SUMMARY_INFO", defaults.summary_info),
        migrations,
        graph_url: env_opt("GRAPHBATCH_GRAPH_URL").unwrap_or(defaults.graph_url),
        timeout_secs: env_parse("GRAPHBATCH_TIMEOUT_SECS", defaults.timeout_secs)?,
        max_attempts: env_parse("GRAPHBATCH_MAX_ATTEMPTS", defaults.max_attempts)?,
    };

    settings.validate()?;
    Ok(settings)
}

/// Load settings from a file
///
/// If `path` is `None`, searches the standard locations. Format is detected
/// by file extension; missing keys take their defaults.
///
/// # Errors
/// Returns `GraphError::Config` if:
/// - File not found (when path is specified)
/// - No settings file found (when path is `None`)
/// - File format is invalid
/// - The loaded settings fail validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<GraphSettings> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(GraphError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => find_config_path().ok_or_else(|| {
            GraphError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading settings from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| GraphError::Config(format!("Failed to read config file: {}", e)))?;

    let settings = parse_config(&contents, &config_path)?;
    settings.validate()?;
    Ok(settings)
}

fn parse_config(contents: &str, path: &Path) -> Result<GraphSettings> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| GraphError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| GraphError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(GraphError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe the standard paths for a settings file
///
/// # Returns
/// The first file found, or `None` if no file exists.
pub fn find_config_path() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }

    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        dirs.push(exe_dir);
    }

    candidates(&dirs).into_iter().find(|path| path.exists())
}

fn candidates(dirs: &[PathBuf]) -> Vec<PathBuf> {
    dirs.iter()
        .flat_map(|dir| {
            FILE_STEMS.iter().flat_map(move |stem| {
                FILE_EXTENSIONS.iter().map(move |ext| dir.join(format!("{stem}.{ext}")))
            })
        })
        .collect()
}

fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        GraphError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Non-empty value of `key`, if set.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| GraphError::Config(format!("Invalid value for {}: {}", key, e))),
        None => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
