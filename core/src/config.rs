//! Client configuration.
//!
//! `ClientConfig` deserializes from any serde source an embedding application
//! already uses, or is read from `INTERCOM_*` environment variables.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

use crate::endpoint::DEFAULT_BASE_URL;
use crate::error::{IntercomError, Result};

/// Number of results requested per page when the caller does not choose one.
pub const DEFAULT_PAGE_SIZE: i32 = 200;

/// Page-size argument meaning "use `DEFAULT_PAGE_SIZE`".
pub const USE_DEFAULT_PAGE_SIZE: i32 = -1;

#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub app_id: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub api_key: SecretString,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Include request payloads and response bodies in debug logs.
    #[serde(default)]
    pub log_payloads: bool,
}

impl ClientConfig {
    pub fn new(app_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            api_key: SecretString::from(api_key.into()),
            page_size: DEFAULT_PAGE_SIZE,
            base_url: default_base_url(),
            timeout_secs: None,
            log_payloads: false,
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| IntercomError::Config(format!("{key} is not set")))
        };

        let mut config = Self::new(required("INTERCOM_APP_ID")?, required("INTERCOM_API_KEY")?);

        if let Some(raw) = lookup("INTERCOM_PAGE_SIZE") {
            config.page_size = parse_var("INTERCOM_PAGE_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("INTERCOM_BASE_URL") {
            config.base_url = raw;
        }
        if let Some(raw) = lookup("INTERCOM_TIMEOUT_SECS") {
            config.timeout_secs = Some(parse_var("INTERCOM_TIMEOUT_SECS", &raw)?);
        }
        if let Some(raw) = lookup("INTERCOM_LOG_PAYLOADS") {
            config.log_payloads = parse_var("INTERCOM_LOG_PAYLOADS", &raw)?;
        }

        Ok(config)
    }

    pub(crate) fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("app_id", &self.app_id)
            .field("api_key", &"[REDACTED]")
            .field("page_size", &self.page_size)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("log_payloads", &self.log_payloads)
            .finish()
    }
}

/// Resolve the page-size sentinel. Other values are taken as given.
pub fn resolve_page_size(page_size: i32) -> i32 {
    if page_size == USE_DEFAULT_PAGE_SIZE {
        DEFAULT_PAGE_SIZE
    } else {
        page_size
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| IntercomError::Config(format!("{key}={raw:?}: {e}")))
}

fn default_page_size() -> i32 {
    DEFAULT_PAGE_SIZE
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}
