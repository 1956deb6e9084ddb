//! In-memory stand-in for the Intercom `users` and `events` endpoints.
//!
//! Requests must carry HTTP Basic credentials matching the ones the state was
//! created with. Tests can queue `ScriptedFailure`s to force the next
//! responses to any status, e.g. a 429 with `X-RateLimit-Reset`.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use uuid::Uuid;

pub use axum::http::StatusCode;

pub type JsonObject = Map<String, Value>;

/// A response to return instead of handling the next request.
#[derive(Debug, Clone)]
pub struct ScriptedFailure {
    pub status: StatusCode,
    pub rate_limit_reset: Option<String>,
    pub body: String,
}

impl ScriptedFailure {
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            rate_limit_reset: None,
            body: String::new(),
        }
    }

    pub fn rate_limited(reset_at: impl Into<String>) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            rate_limit_reset: Some(reset_at.into()),
            body: String::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

#[derive(Debug, Default)]
struct Store {
    users: Vec<JsonObject>,
    events: Vec<JsonObject>,
    failures: VecDeque<ScriptedFailure>,
}

/// Shared server state. Cloning shares the same store.
#[derive(Debug, Clone)]
pub struct MockState {
    authorization: Arc<str>,
    store: Arc<Mutex<Store>>,
}

impl MockState {
    pub fn new(app_id: &str, api_key: &str) -> Self {
        let encoded = STANDARD.encode(format!("{app_id}:{api_key}"));
        Self {
            authorization: Arc::from(format!("Basic {encoded}")),
            store: Arc::default(),
        }
    }

    /// Queue a failure; queued failures are served first-in first-out.
    pub fn fail_next(&self, failure: ScriptedFailure) {
        self.lock().failures.push_back(failure);
    }

    pub fn users(&self) -> Vec<JsonObject> {
        self.lock().users.clone()
    }

    pub fn events(&self) -> Vec<JsonObject> {
        self.lock().events.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn app(state: MockState) -> Router {
    Router::new()
        .route("/users", get(list_users).post(update_user))
        .route("/events", post(create_event))
        .layer(middleware::from_fn_with_state(state.clone(), gatekeeper))
        .with_state(state)
}

pub async fn run(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

/// Rejects bad credentials, then serves any queued failure.
async fn gatekeeper(State(state): State<MockState>, request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == &*state.authorization);
    if !authorized {
        tracing::debug!(uri = %request.uri(), "rejecting request without valid credentials");
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized", "Access Token Invalid");
    }

    let failure = state.lock().failures.pop_front();
    if let Some(failure) = failure {
        tracing::debug!(status = %failure.status, uri = %request.uri(), "serving scripted failure");
        let mut headers = HeaderMap::new();
        if let Some(reset) = failure.rate_limit_reset.as_deref() {
            if let Ok(value) = HeaderValue::from_str(reset) {
                headers.insert("x-ratelimit-reset", value);
            }
        }
        return (failure.status, headers, failure.body).into_response();
    }

    next.run(request).await
}

async fn update_user(State(state): State<MockState>, Json(input): Json<JsonObject>) -> Response {
    let user_id = non_empty_str(&input, "user_id");
    let email = non_empty_str(&input, "email");
    if user_id.is_none() && email.is_none() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "parameter_not_found",
            "Missing user_id or email parameter",
        );
    }

    let mut store = state.lock();
    let existing = store.users.iter_mut().find(|user| {
        (user_id.is_some() && non_empty_str(user, "user_id") == user_id)
            || (email.is_some() && non_empty_str(user, "email") == email)
    });

    let user = match existing {
        Some(user) => {
            merge_user(user, input);
            user.clone()
        }
        None => {
            let mut user = JsonObject::new();
            user.insert("type".to_string(), json!("user"));
            user.insert("id".to_string(), json!(Uuid::new_v4().to_string()));
            merge_user(&mut user, input);
            store.users.push(user.clone());
            user
        }
    };

    (StatusCode::OK, Json(user)).into_response()
}

async fn create_event(State(state): State<MockState>, Json(input): Json<JsonObject>) -> Response {
    if non_empty_str(&input, "event_name").is_none() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "parameter_not_found",
            "Missing event_name parameter",
        );
    }
    state.lock().events.push(input);
    StatusCode::ACCEPTED.into_response()
}

#[derive(Debug, Deserialize)]
struct Pagination {
    page: Option<usize>,
    per_page: Option<usize>,
}

async fn list_users(State(state): State<MockState>, Query(pagination): Query<Pagination>) -> Json<Value> {
    let page = pagination.page.unwrap_or(1).max(1);
    let per_page = pagination.per_page.unwrap_or(50).max(1);

    let store = state.lock();
    let total = store.users.len();
    let users: Vec<&JsonObject> = store
        .users
        .iter()
        .skip((page - 1).saturating_mul(per_page))
        .take(per_page)
        .collect();

    Json(json!({
        "type": "user.list",
        "total_count": total,
        "users": users,
        "pages": {
            "type": "pages",
            "page": page,
            "per_page": per_page,
            "total_pages": total.div_ceil(per_page),
        },
    }))
}

/// Apply an update; `custom_attributes` merge key by key, other fields replace.
fn merge_user(user: &mut JsonObject, input: JsonObject) {
    for (key, value) in input {
        if key == "type" || key == "id" {
            continue;
        }
        if key == "custom_attributes" {
            if let (Some(Value::Object(existing)), Value::Object(attributes)) = (user.get_mut(&key), &value) {
                existing.extend(attributes.clone());
                continue;
            }
        }
        user.insert(key, value);
    }
}

fn non_empty_str<'a>(object: &'a JsonObject, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    let body = json!({
        "type": "error.list",
        "errors": [{"code": code, "message": message}],
    });
    (status, Json(body)).into_response()
}
