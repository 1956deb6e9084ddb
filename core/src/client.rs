//! Intercom API client and request executor.
//!
//! # Design
//! `IntercomClient` is immutable after construction and holds no per-request
//! state, so one instance can serve concurrent callers. Every operation goes
//! through the same three steps:
//!
//! 1. `build_request` serializes the parameters and adds JSON and Basic auth
//!    headers.
//! 2. The shared `Transport` performs the round trip.
//! 3. `classify_response` maps the status code onto `IntercomError`.
//!
//! Steps 1 and 3 are pure functions of their inputs and are public so they
//! can be tested without a network.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::config::{resolve_page_size, ClientConfig};
use crate::endpoint::BaseUrl;
use crate::error::{IntercomError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::{Transport, UreqTransport};
use crate::types::{Credentials, JsonObject};

const USERS: &str = "users";
const EVENTS: &str = "events";

const RATE_LIMIT_RESET_HEADER: &str = "X-RateLimit-Reset";

/// Client for the Intercom REST API.
#[derive(Clone)]
pub struct IntercomClient {
    transport: Arc<dyn Transport>,
    credentials: Credentials,
    base_url: BaseUrl,
    page_size: i32,
    timeout: Option<Duration>,
    log_payloads: bool,
}

impl IntercomClient {
    /// Create a client for the production API.
    ///
    /// `page_size` of `USE_DEFAULT_PAGE_SIZE` (-1) selects `DEFAULT_PAGE_SIZE`.
    pub fn new(app_id: impl Into<String>, api_key: impl Into<String>, page_size: i32) -> Self {
        Self::new_with_transport(app_id, api_key, page_size, Arc::new(UreqTransport::new()))
    }

    /// Like `new`, but sends every request through `transport`.
    pub fn new_with_transport(
        app_id: impl Into<String>,
        api_key: impl Into<String>,
        page_size: i32,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            transport,
            credentials: Credentials::new(app_id, api_key),
            base_url: BaseUrl::default(),
            page_size: resolve_page_size(page_size),
            timeout: None,
            log_payloads: false,
        }
    }

    /// Create a client from configuration. Fails if the base URL is invalid.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let base_url = BaseUrl::parse(&config.base_url)?;
        Ok(Self {
            transport: Arc::new(UreqTransport::new()),
            credentials: Credentials::new(config.app_id.clone(), config.api_key()),
            base_url,
            page_size: resolve_page_size(config.page_size),
            timeout: config.timeout_secs.map(Duration::from_secs),
            log_payloads: config.log_payloads,
        })
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_base_url(mut self, base_url: BaseUrl) -> Self {
        self.base_url = base_url;
        self
    }

    /// Bound every request made by this client to `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_payload_logging(mut self, enabled: bool) -> Self {
        self.log_payloads = enabled;
        self
    }

    pub fn page_size(&self) -> i32 {
        self.page_size
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    pub fn app_id(&self) -> &str {
        self.credentials.app_id()
    }

    /// Create or update a user.
    ///
    /// `fields` is typically a `UserUpdate` but may be any value serializing
    /// to a JSON object, or to null for a POST without a body.
    pub fn update_user<T: Serialize + ?Sized>(&self, fields: &T) -> Result<()> {
        self.post(USERS, fields)
    }

    /// Record an event against a user.
    pub fn create_event<T: Serialize + ?Sized>(&self, fields: &T) -> Result<()> {
        self.post(EVENTS, fields)
    }

    /// Fetch one page of users, sized by the client's page size.
    ///
    /// `page` is 1-based; `None` asks for the first page. Continuation links in
    /// the response are returned untouched.
    pub fn list_users(&self, page: Option<u32>) -> Result<Option<JsonObject>> {
        let mut query = BTreeMap::from([("per_page".to_string(), self.page_size.to_string())]);
        if let Some(page) = page {
            query.insert("page".to_string(), page.to_string());
        }
        let url = self.base_url.resource(USERS, &query);
        self.execute(HttpMethod::Get, &url, None).inspect_err(|err| {
            tracing::error!(error = %err, resource = USERS, "listing users failed");
        })
    }

    /// POST `fields` to `resource`. A null payload is sent without a body.
    fn post<T: Serialize + ?Sized>(&self, resource: &str, fields: &T) -> Result<()> {
        serde_json::to_value(fields)
            .map_err(|e| IntercomError::Serialization(e.to_string()))
            .and_then(|params| {
                let url = self.base_url.resource(resource, &BTreeMap::new());
                let params = (!params.is_null()).then_some(&params);
                self.execute(HttpMethod::Post, &url, params)
            })
            .map(|_| ())
            .inspect_err(|err| {
                tracing::error!(error = %err, resource, "request failed");
            })
    }

    /// Perform one request/response cycle and classify the outcome.
    pub fn execute(
        &self,
        method: HttpMethod,
        url: &str,
        params: Option<&Value>,
    ) -> Result<Option<JsonObject>> {
        let request = self.build_request(method, url, params)?;

        tracing::debug!(%method, url, "executing request");
        if self.log_payloads {
            if let Some(body) = &request.body {
                tracing::debug!(body = %String::from_utf8_lossy(body), "request body");
            }
        }

        let response = self.transport.send(request, self.timeout)?;

        tracing::debug!(status = response.status, url, "received response");
        if self.log_payloads {
            tracing::debug!(body = %String::from_utf8_lossy(&response.body), "response body");
        }

        classify_response(response)
    }

    /// Build the request for `method` and `url`.
    ///
    /// A JSON body is attached only to POST requests with parameters; the
    /// parameters must be a JSON object.
    pub fn build_request(
        &self,
        method: HttpMethod,
        url: &str,
        params: Option<&Value>,
    ) -> Result<HttpRequest> {
        let body = match (method, params) {
            (HttpMethod::Post, Some(Value::Object(map))) => Some(
                serde_json::to_vec(map).map_err(|e| IntercomError::Serialization(e.to_string()))?,
            ),
            (HttpMethod::Post, Some(other)) => {
                return Err(IntercomError::Serialization(format!(
                    "request parameters must be a JSON object, got {}",
                    json_kind(other)
                )));
            }
            _ => None,
        };

        Ok(HttpRequest {
            method,
            url: url.to_string(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
                ("Authorization".to_string(), self.credentials.basic_auth_header()),
            ],
            body,
        })
    }
}

impl std::fmt::Debug for IntercomClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntercomClient")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .field("timeout", &self.timeout)
            .field("log_payloads", &self.log_payloads)
            .finish_non_exhaustive()
    }
}

/// Map a response onto the client's result type.
///
/// 200 yields the decoded JSON object and 202 yields `None`. Every other
/// status is an error.
pub fn classify_response(response: HttpResponse) -> Result<Option<JsonObject>> {
    match response.status {
        200 => serde_json::from_slice::<JsonObject>(&response.body)
            .map(Some)
            .map_err(|e| IntercomError::Decoding(e.to_string())),
        202 => Ok(None),
        404 => Err(IntercomError::NotFound),
        429 => {
            let reset_at = response
                .header(RATE_LIMIT_RESET_HEADER)
                .and_then(|value| value.trim().parse::<i64>().ok())
                .unwrap_or(0);
            Err(IntercomError::RateLimited { reset_at })
        }
        500 | 502 | 503 | 504 => Err(IntercomError::Server {
            status: response.status,
        }),
        status => Err(IntercomError::UnknownStatus(status)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use tracing_test::traced_test;

    use super::*;
    use crate::config::{DEFAULT_PAGE_SIZE, USE_DEFAULT_PAGE_SIZE};
    use crate::types::{Event, UserUpdate};

    /// Records every request and answers with a canned response.
    struct StubTransport {
        response: HttpResponse,
        requests: Mutex<Vec<(HttpRequest, Option<Duration>)>>,
    }

    impl StubTransport {
        fn new(status: u16, headers: &[(&str, &str)], body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: response(status, headers, body),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last_request(&self) -> (HttpRequest, Option<Duration>) {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl Transport for StubTransport {
        fn send(&self, request: HttpRequest, timeout: Option<Duration>) -> Result<HttpResponse> {
            self.requests.lock().unwrap().push((request, timeout));
            Ok(self.response.clone())
        }
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn send(&self, _: HttpRequest, _: Option<Duration>) -> Result<HttpResponse> {
            Err(IntercomError::Transport("connection refused".to_string()))
        }
    }

    fn response(status: u16, headers: &[(&str, &str)], body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn client() -> IntercomClient {
        IntercomClient::new("app-id", "api-key", USE_DEFAULT_PAGE_SIZE)
    }

    fn stub_client(transport: Arc<dyn Transport>) -> IntercomClient {
        IntercomClient::new_with_transport("app-id", "api-key", USE_DEFAULT_PAGE_SIZE, transport)
    }

    #[test]
    fn page_size_sentinel_uses_default() {
        assert_eq!(client().page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(IntercomClient::new("a", "k", 50).page_size(), 50);
    }

    #[test]
    fn from_config_rejects_invalid_base_url() {
        let mut config = ClientConfig::new("app", "key");
        config.base_url = "::not-a-url".to_string();
        let err = IntercomClient::from_config(&config).unwrap_err();
        assert!(matches!(err, IntercomError::Config(_)));
    }

    #[test]
    fn from_config_carries_settings() {
        let mut config = ClientConfig::new("app", "key");
        config.page_size = USE_DEFAULT_PAGE_SIZE;
        config.base_url = "http://127.0.0.1:3000".to_string();
        config.timeout_secs = Some(3);
        let client = IntercomClient::from_config(&config).unwrap();
        assert_eq!(client.page_size(), 200);
        assert_eq!(client.base_url().as_str(), "http://127.0.0.1:3000/");
        assert_eq!(client.app_id(), "app");
        assert_eq!(client.timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn build_post_request_has_json_body_and_auth() {
        let params = json!({"user_id": "25", "custom_attributes": {"plan": "pro"}});
        let req = client()
            .build_request(HttpMethod::Post, "https://api.intercom.io/users", Some(&params))
            .unwrap();

        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "https://api.intercom.io/users");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("accept"), Some("application/json"));
        assert_eq!(req.header("authorization"), Some("Basic YXBwLWlkOmFwaS1rZXk="));

        let body: Value = serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, params);
    }

    #[test]
    fn build_get_request_has_no_body() {
        let params = json!({"ignored": true});
        let req = client()
            .build_request(HttpMethod::Get, "https://api.intercom.io/users", Some(&params))
            .unwrap();
        assert!(req.body.is_none());
        assert!(req.header("authorization").is_some());
    }

    #[test]
    fn build_post_without_params_has_no_body() {
        let req = client()
            .build_request(HttpMethod::Post, "https://api.intercom.io/users", None)
            .unwrap();
        assert!(req.body.is_none());
    }

    #[test]
    fn empty_params_are_sent_as_empty_object() {
        let req = client()
            .build_request(HttpMethod::Post, "https://api.intercom.io/users", Some(&json!({})))
            .unwrap();
        assert_eq!(req.body.as_deref(), Some(&b"{}"[..]));
    }

    #[test]
    fn non_object_params_fail_fast() {
        let err = client()
            .build_request(HttpMethod::Post, "https://api.intercom.io/users", Some(&json!([1, 2])))
            .unwrap_err();
        assert!(matches!(err, IntercomError::Serialization(msg) if msg.contains("an array")));
    }

    #[test]
    fn classify_200_returns_object() {
        let result = classify_response(response(200, &[], r#"{"id":"42"}"#)).unwrap();
        let expected = json!({"id": "42"});
        assert_eq!(result.as_ref(), expected.as_object());
    }

    #[test]
    fn classify_200_with_malformed_body_is_decoding_error() {
        let err = classify_response(response(200, &[], "not json")).unwrap_err();
        assert!(matches!(err, IntercomError::Decoding(_)));

        let err = classify_response(response(200, &[], "[1,2,3]")).unwrap_err();
        assert!(matches!(err, IntercomError::Decoding(_)));
    }

    #[test]
    fn classify_202_ignores_body() {
        assert_eq!(classify_response(response(202, &[], "whatever")).unwrap(), None);
        assert_eq!(classify_response(response(202, &[], "")).unwrap(), None);
    }

    #[test]
    fn classify_404_is_not_found() {
        let err = classify_response(response(404, &[], r#"{"type":"error.list"}"#)).unwrap_err();
        assert!(matches!(err, IntercomError::NotFound));
    }

    #[test]
    fn classify_429_reads_reset_header() {
        let err = classify_response(response(429, &[("X-RateLimit-Reset", "1700000000")], ""))
            .unwrap_err();
        assert!(matches!(err, IntercomError::RateLimited { reset_at: 1_700_000_000 }));
    }

    #[test]
    fn classify_429_without_usable_header_resets_at_zero() {
        let err = classify_response(response(429, &[], "")).unwrap_err();
        assert!(matches!(err, IntercomError::RateLimited { reset_at: 0 }));

        let err = classify_response(response(429, &[("X-RateLimit-Reset", "soon")], ""))
            .unwrap_err();
        assert!(matches!(err, IntercomError::RateLimited { reset_at: 0 }));
    }

    #[test]
    fn classify_5xx_is_server_error() {
        for status in [500, 502, 503, 504] {
            let err = classify_response(response(status, &[], "")).unwrap_err();
            assert!(matches!(err, IntercomError::Server { status: s } if s == status));
        }
    }

    #[test]
    fn classify_other_status_is_unknown() {
        let err = classify_response(response(418, &[], "")).unwrap_err();
        assert!(matches!(err, IntercomError::UnknownStatus(418)));

        // 501 is not among the server statuses.
        let err = classify_response(response(501, &[], "")).unwrap_err();
        assert!(matches!(err, IntercomError::UnknownStatus(501)));

        let err = classify_response(response(201, &[], "{}")).unwrap_err();
        assert!(matches!(err, IntercomError::UnknownStatus(201)));
    }

    #[test]
    fn update_user_posts_fields_verbatim() {
        let transport = StubTransport::new(200, &[], r#"{"type":"user","id":"abc"}"#);
        let client = stub_client(transport.clone());
        let update = UserUpdate::with_user_id("25")
            .name("Hoban Washburne")
            .custom_attribute("ship", "Serenity");

        client.update_user(&update).unwrap();

        let (req, timeout) = transport.last_request();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "https://api.intercom.io/users");
        assert_eq!(timeout, None);
        let sent: UserUpdate = serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(sent, update);
    }

    #[test]
    fn create_event_accepts_raw_map() {
        let transport = StubTransport::new(202, &[], "");
        let client = stub_client(transport.clone())
            .with_timeout(Duration::from_secs(2));
        let fields = json!({"event_name": "signed-up", "user_id": "25", "created_at": 1_391_691_571});

        client.create_event(&fields).unwrap();

        let (req, timeout) = transport.last_request();
        assert_eq!(req.url, "https://api.intercom.io/events");
        assert_eq!(timeout, Some(Duration::from_secs(2)));
        let sent: Value = serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(sent, fields);
    }

    #[test]
    fn create_event_propagates_rate_limit() {
        let transport = StubTransport::new(429, &[("x-ratelimit-reset", "1700000000")], "");
        let client = stub_client(transport);
        let err = client.create_event(&Event::new("signed-up")).unwrap_err();
        assert_eq!(err.rate_limit_reset(), Some(1_700_000_000));
    }

    #[test]
    fn transport_errors_pass_through() {
        let client = stub_client(Arc::new(FailingTransport));
        let err = client.update_user(&UserUpdate::with_email("kaylee@serenity.io")).unwrap_err();
        assert!(matches!(err, IntercomError::Transport(msg) if msg == "connection refused"));
    }

    #[test]
    fn non_object_payload_never_reaches_transport() {
        let transport = StubTransport::new(200, &[], "{}");
        let client = stub_client(transport.clone());
        let err = client.update_user(&"just a string").unwrap_err();
        assert!(matches!(err, IntercomError::Serialization(_)));
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn null_payload_is_posted_without_body() {
        let transport = StubTransport::new(202, &[], "");
        let client = stub_client(transport.clone());

        client.update_user(&Option::<JsonObject>::None).unwrap();

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (req, _) = &requests[0];
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "https://api.intercom.io/users");
        assert!(req.body.is_none());
    }

    #[test]
    fn non_object_payloads_other_than_null_are_rejected() {
        let transport = StubTransport::new(200, &[], "{}");
        let client = stub_client(transport.clone());
        for payload in [json!([1, 2]), json!(7), json!(true)] {
            let err = client.create_event(&payload).unwrap_err();
            assert!(matches!(err, IntercomError::Serialization(_)), "{payload}");
        }
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn list_users_sends_page_size() {
        let transport = StubTransport::new(200, &[], r#"{"type":"user.list","users":[]}"#);
        let client = IntercomClient::new_with_transport("app-id", "api-key", 50, transport.clone());

        let page = client.list_users(Some(2)).unwrap().unwrap();
        assert_eq!(page["type"], "user.list");

        let (req, _) = transport.last_request();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "https://api.intercom.io/users?page=2&per_page=50");
        assert!(req.body.is_none());
    }

    #[test]
    #[traced_test]
    fn failed_operation_is_logged() {
        let transport = StubTransport::new(503, &[], "");
        let client = stub_client(transport);
        let err = client.update_user(&UserUpdate::with_user_id("1")).unwrap_err();
        assert!(matches!(err, IntercomError::Server { status: 503 }));
        assert!(logs_contain("request failed"));
        assert!(logs_contain("server error (HTTP 503)"));
    }

    #[test]
    #[traced_test]
    fn payloads_are_not_logged_by_default() {
        let transport = StubTransport::new(200, &[], r#"{"secret_reply":"yes"}"#);
        let client = stub_client(transport);
        client.update_user(&UserUpdate::with_email("inara@serenity.io")).unwrap();
        assert!(logs_contain("executing request"));
        assert!(!logs_contain("inara@serenity.io"));
        assert!(!logs_contain("secret_reply"));
    }

    #[test]
    #[traced_test]
    fn payload_logging_can_be_enabled() {
        let transport = StubTransport::new(200, &[], r#"{"secret_reply":"yes"}"#);
        let client = stub_client(transport).with_payload_logging(true);
        client.update_user(&UserUpdate::with_email("inara@serenity.io")).unwrap();
        assert!(logs_contain("inara@serenity.io"));
        assert!(logs_contain("secret_reply"));
    }
}
