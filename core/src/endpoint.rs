//! Absolute request URLs for API resources.
//!
//! The base URL is parsed once when the client is constructed, so building a
//! resource URL never fails at request time.

use std::collections::BTreeMap;

use url::Url;

use crate::error::{IntercomError, Result};

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.intercom.io/";

/// A validated base URL that resource paths are appended to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(Url);

impl BaseUrl {
    /// Parse and validate a base URL. A missing trailing slash is added so
    /// that `users` lands below the base path rather than replacing it.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut url = Url::parse(raw).map_err(|e| IntercomError::Config(format!("base URL {raw:?}: {e}")))?;
        if url.cannot_be_a_base() {
            return Err(IntercomError::Config(format!("base URL {raw:?} cannot carry paths")));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url.set_query(None);
        url.set_fragment(None);
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Compose the absolute URL for `path` with `query` form-encoded.
    ///
    /// Parameters are emitted in key order. An empty query adds no `?`.
    pub fn resource(&self, path: &str, query: &BTreeMap<String, String>) -> String {
        let mut url = self.0.clone();
        let full_path = format!("{}{}", url.path(), path.trim_start_matches('/'));
        url.set_path(&full_path);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter());
        }
        url.into()
    }
}

impl Default for BaseUrl {
    fn default() -> Self {
        Self(Url::parse(DEFAULT_BASE_URL).expect("DEFAULT_BASE_URL is a valid absolute URL"))
    }
}
