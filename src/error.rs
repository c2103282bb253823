//! Unified error types for the spread scanner.

use std::time::Duration;

use thiserror::Error;

use crate::market::ExchangeId;

/// Unified error type for the spread scanner.
#[derive(Error, Debug)]
pub enum ScannerError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Exchange adapter error.
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// Query validation error.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// Quote store invariant violation.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Background task panicked or was aborted.
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Failure of one adapter call.
///
/// The poller treats every variant as "skip this cycle"; only the delay
/// before the next attempt differs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The exchange asked us to slow down.
    #[error("rate limited{}", .retry_after.map(|d| format!(": retry after {}ms", d.as_millis())).unwrap_or_default())]
    RateLimited {
        /// Server-provided wait, if any.
        retry_after: Option<Duration>,
    },

    /// Exchange unreachable, timed out, or answered with a server error.
    #[error("exchange unavailable: {0}")]
    Unavailable(String),

    /// Response could not be decoded into quotes or network info.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Signed request could not be built or the exchange rejected the key.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl AdapterError {
    /// Timeout of a call bounded by `limit`.
    pub fn timed_out(limit: Duration) -> Self {
        AdapterError::Unavailable(format!("timed out after {}ms", limit.as_millis()))
    }

    /// Whether this error should trigger rate-limit backoff.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AdapterError::RateLimited { .. })
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterError::RateLimited { .. } => "rate_limited",
            AdapterError::Unavailable(_) => "unavailable",
            AdapterError::Malformed(_) => "malformed",
            AdapterError::Unauthorized(_) => "unauthorized",
        }
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            if status.as_u16() == 429 {
                return AdapterError::RateLimited { retry_after: None };
            }
            if matches!(status.as_u16(), 401 | 403) {
                return AdapterError::Unauthorized(format!("request rejected: {}", status));
            }
            if status.is_client_error() {
                return AdapterError::Malformed(format!("request rejected: {}", status));
            }
            return AdapterError::Unavailable(format!("server error: {}", status));
        }

        if err.is_decode() || err.is_body() {
            AdapterError::Malformed(err.to_string())
        } else {
            AdapterError::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Malformed(err.to_string())
    }
}

/// Errors returned synchronously to query callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Filter criteria violate a constraint.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}

/// Quote store invariant violations. Always fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Write to an exchange that was never registered.
    #[error("exchange {0} is not registered in the quote store")]
    UnknownExchange(ExchangeId),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, ScannerError>;
