//! Request payloads and credentials for the Intercom API.
//!
//! # Design
//! The remote service owns its schema: nothing here is validated locally,
//! including the "user_id or email" requirement on user updates. The typed
//! payloads name the documented fields and keep an `extra` map flattened into
//! the body for anything they do not name. Unset fields are omitted from the
//! JSON entirely.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON object as sent to or received from the API.
pub type JsonObject = Map<String, Value>;

/// HTTP Basic credentials: the application id and its API key.
#[derive(Clone)]
pub struct Credentials {
    app_id: String,
    api_key: SecretString,
}

impl Credentials {
    pub fn new(app_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            api_key: SecretString::from(api_key.into()),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Value for the `Authorization` header.
    pub fn basic_auth_header(&self) -> String {
        let raw = format!("{}:{}", self.app_id, self.api_key.expose_secret());
        format!("Basic {}", STANDARD.encode(raw))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// A company the user belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: JsonObject,
}

/// Body for `POST users`: creates the user or updates the existing one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Intercom's own id, usable for updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub signed_up_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_ip: Option<String>,
    #[serde(default, skip_serializing_if = "JsonObject::is_empty")]
    pub custom_attributes: JsonObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub companies: Vec<Company>,
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_request_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsubscribed_from_emails: Option<bool>,
    /// Ask the service to stamp `last_request_at` with its own clock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_last_request_at: Option<bool>,
    /// Register the request as a new session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_session: Option<bool>,
    #[serde(flatten)]
    pub extra: JsonObject,
}

impl UserUpdate {
    pub fn with_user_id(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn signed_up_at(mut self, at: DateTime<Utc>) -> Self {
        self.signed_up_at = Some(at);
        self
    }

    pub fn last_seen_ip(mut self, ip: impl Into<String>) -> Self {
        self.last_seen_ip = Some(ip.into());
        self
    }

    pub fn last_seen_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.last_seen_user_agent = Some(user_agent.into());
        self
    }

    pub fn last_request_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_request_at = Some(at);
        self
    }

    pub fn unsubscribed_from_emails(mut self, unsubscribed: bool) -> Self {
        self.unsubscribed_from_emails = Some(unsubscribed);
        self
    }

    pub fn update_last_request_at(mut self, update: bool) -> Self {
        self.update_last_request_at = Some(update);
        self
    }

    pub fn new_session(mut self, new_session: bool) -> Self {
        self.new_session = Some(new_session);
        self
    }

    pub fn company(mut self, company: Company) -> Self {
        self.companies.push(company);
        self
    }

    pub fn custom_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom_attributes.insert(key.into(), value.into());
        self
    }

    /// Set a top-level field this type does not name.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Body for `POST events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_name: String,
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "JsonObject::is_empty")]
    pub metadata: JsonObject,
    #[serde(flatten)]
    pub extra: JsonObject,
}

impl Event {
    pub fn new(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            created_at: None,
            user_id: None,
            email: None,
            id: None,
            metadata: JsonObject::new(),
            extra: JsonObject::new(),
        }
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}
