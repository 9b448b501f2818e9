//! Relative request targets
//!
//! A batch entry addresses its operation by a path relative to the API root
//! plus a query string. Query parameters are set with replace semantics: a
//! key set twice keeps only the last value.

use std::fmt;

use url::{form_urlencoded, Url};

/// Path and query of one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativeUrl {
    path: String,
    query: Vec<(String, String)>,
}

impl RelativeUrl {
    /// Parse a relative target such as `me/feed?limit=25`.
    pub fn parse(target: &str) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        Self {
            path: path.trim_start_matches('/').to_owned(),
            query: form_urlencoded::parse(query.as_bytes()).into_owned().collect(),
        }
    }

    /// Parse a link returned by the server, dropping scheme and host.
    pub fn from_link(link: &str) -> Self {
        match Url::parse(link) {
            Ok(url) => {
                let mut relative = Self::parse(url.path());
                relative.query =
                    url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
                relative
            }
            Err(_) => Self::parse(link),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// First value of `key` in the query.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Set `key` to `value`, replacing any existing values.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.query.retain(|(k, _)| k != key);
        self.query.push((key.to_owned(), value.into()));
    }

    pub fn set_all<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in pairs {
            self.set(key.as_ref(), value);
        }
    }
}

impl fmt::Display for RelativeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if !self.query.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.query.iter())
                .finish();
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}

/// Urlencode `(key, value)` pairs in the given order.
pub fn encode_pairs<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    form_urlencoded::Serializer::new(String::new()).extend_pairs(pairs).finish()
}
