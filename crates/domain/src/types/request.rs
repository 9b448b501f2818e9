//! Request identity types
//!
//! Everything needed to describe one logical request before it is resolved
//! into a wire-level batch entry.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::impl_wire_name_conversions;

/// HTTP-like verb of a logical request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    /// Token introspection; sent as a GET against the debug endpoint.
    DebugToken,
}

impl_wire_name_conversions!(Method {
    Get => "GET",
    Post => "POST",
    Put => "PUT",
    Delete => "DELETE",
    DebugToken => "DEBUG_TOKEN",
});

impl Method {
    /// Verb as it appears inside a batch entry.
    pub fn wire_verb(self) -> &'static str {
        match self {
            Self::Get | Self::DebugToken => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Write-type requests carry their parameters in the entry body.
    pub fn carries_body(self) -> bool {
        matches!(self, Self::Post)
    }
}

/// Binary payload attached to a write request by file path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileAttachment {
    pub path: PathBuf,
}

/// Identity of an attached file, independent of its content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileFingerprint {
    pub device: i64,
    pub inode: u64,
}

impl FileAttachment {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// (device, inode) of the file, the same identity `samefile` uses.
    ///
    /// Falls back to `(-1, hash(path))` when the file cannot be stat'ed.
    pub fn fingerprint(&self) -> FileFingerprint {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;

            if let Ok(meta) = std::fs::metadata(&self.path) {
                let device = i64::try_from(meta.dev()).unwrap_or(i64::MAX);
                return FileFingerprint { device, inode: meta.ino() };
            }
        }

        let mut hasher = DefaultHasher::new();
        self.path.hash(&mut hasher);
        FileFingerprint { device: -1, inode: hasher.finish() }
    }
}

/// One input parameter of a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
    Value(Value),
    File(FileAttachment),
}

impl ParamValue {
    /// Query/body encoding of the value: strings verbatim, lists and
    /// mappings as compact key-sorted JSON, scalars as their JSON text.
    /// Files have no textual encoding.
    pub fn encode(&self) -> Option<String> {
        match self {
            Self::Value(Value::String(s)) => Some(s.clone()),
            Self::Value(other) => Some(other.to_string()),
            Self::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileAttachment> {
        match self {
            Self::File(file) => Some(file),
            Self::Value(_) => None,
        }
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_owned()))
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Value(Value::Bool(value))
    }
}

impl From<FileAttachment> for ParamValue {
    fn from(value: FileAttachment) -> Self {
        Self::File(value)
    }
}

/// Input parameters, kept in key order so encodings are canonical.
pub type Params = BTreeMap<String, ParamValue>;

/// Migration overrides forwarded with every request of a client.
pub type Migrations = BTreeMap<String, bool>;

/// Build a [`Params`] map from `(key, value)` pairs.
pub fn params<K, V, I>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<ParamValue>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// Credentials applied to an individual request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub token: Option<String>,
    pub app_secret: Option<String>,
}

/// Behaviour flags fixed when a request handle is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFlags {
    pub raise_on_failure: bool,
    pub prefetch_next_page: bool,
    pub summary_info: bool,
    pub migrations: Option<Migrations>,
}

impl Default for RequestFlags {
    fn default() -> Self {
        Self { raise_on_failure: true, prefetch_next_page: true, summary_info: false, migrations: None }
    }
}

/// Immutable identity of a logical request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    #[serde(default)]
    pub params: Params,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>, params: Params) -> Self {
        Self { method, path: path.into(), params }
    }
}
