//! Synchronous client for the Intercom REST API.
//!
//! # Overview
//! Sends user updates and events to `https://api.intercom.io/` with HTTP Basic
//! authentication and maps response status codes onto `IntercomError`.
//!
//! # Design
//! - `IntercomClient` is immutable after construction and safe to share.
//! - Requests and responses are plain data (`HttpRequest`, `HttpResponse`);
//!   the network round trip sits behind the `Transport` trait.
//! - Diagnostics go through `tracing`. Payloads are only logged on request.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod transport;
pub mod types;

pub use client::{classify_response, IntercomClient};
pub use config::{ClientConfig, DEFAULT_PAGE_SIZE, USE_DEFAULT_PAGE_SIZE};
pub use endpoint::{BaseUrl, DEFAULT_BASE_URL};
pub use error::{IntercomError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::{Transport, UreqTransport};
pub use types::{Company, Credentials, Event, JsonObject, UserUpdate};
