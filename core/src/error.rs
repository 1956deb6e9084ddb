//! Error types for the Intercom client.
//!
//! # Design
//! Status codes the remote service uses with a known meaning get their own
//! variant so callers can match on them. `RateLimited` carries the reset time
//! from `X-RateLimit-Reset`; backing off is the caller's job.

use thiserror::Error;

/// Errors returned by `IntercomClient` and its transports.
#[derive(Debug, Error)]
pub enum IntercomError {
    /// Connection failure, timeout, or a failed body read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request parameters could not be serialized to a JSON object.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A 200 response body was not a JSON object.
    #[error("decoding failed: {0}")]
    Decoding(String),

    /// The server returned 404.
    #[error("not-found")]
    NotFound,

    /// The server returned 429. `reset_at` is in epoch seconds, 0 when the
    /// header was missing or malformed.
    #[error("rate limit will reset at: '{reset_at}'")]
    RateLimited { reset_at: i64 },

    /// The server returned 500, 502, 503 or 504.
    #[error("server error (HTTP {status})")]
    Server { status: u16 },

    /// Any status without a dedicated classification.
    #[error("unknown, error code: {0}")]
    UnknownStatus(u16),

    /// Invalid client configuration, detected at construction time.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl IntercomError {
    /// Whether repeating the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IntercomError::Transport(_)
                | IntercomError::RateLimited { .. }
                | IntercomError::Server { .. }
        )
    }

    /// Epoch seconds at which the rate limit window resets, if rate limited.
    pub fn rate_limit_reset(&self) -> Option<i64> {
        match self {
            IntercomError::RateLimited { reset_at } => Some(*reset_at),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, IntercomError>;
