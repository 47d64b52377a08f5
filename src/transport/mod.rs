//! Throttled HTTP transport
//!
//! Every request the client makes goes through one [`ThrottledTransport`]. It
//! owns the pooled HTTP client, queues submissions in FIFO order and dispatches
//! them no closer together than the configured delay, no matter how many tasks
//! are submitting at once.
//!
//! # Components
//!
//! - [`throttle`] - Dispatcher task, queue, per-call timeout and shutdown
//! - [`backend`] - [`HttpBackend`] seam and the reqwest implementation
//! - [`config`] - Defaults and [`TransportConfig`]
//! - [`shutdown`] - Idempotent shutdown flag shared with the dispatcher
//!
//! # Error Handling
//!
//! - Timeouts fail the one call that timed out; the request is abandoned, never retried
//! - Non-2xx responses surface as [`TransportError::HttpStatus`] with the body attached
//! - Sends after shutdown fail with [`TransportError::Closed`]

use reqwest::Method;
use std::time::Duration;

pub mod backend;
pub mod config;
pub mod shutdown;
pub mod throttle;

pub use backend::{HttpBackend, ReqwestBackend};
pub use config::TransportConfig;
pub use shutdown::ShutdownSignal;
pub use throttle::ThrottledTransport;

/// Transport errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// No response within the per-call bound
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Backend answered with a non-success status
    #[error("HTTP status {status}: {body}")]
    HttpStatus {
        /// Status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Connection-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Transport was shut down before the request completed
    #[error("transport is shut down")]
    Closed,

    /// Request could not be assembled (bad URL, header, ...)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// HTTP client construction failed
    #[error("failed to build HTTP client: {0}")]
    Build(String),

    /// Transport was opened outside a Tokio runtime
    #[error("no Tokio runtime available to run the dispatcher")]
    NoRuntime,
}

impl TransportError {
    /// Whether re-issuing the same call may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout(_) | TransportError::HttpStatus { .. } | TransportError::Network(_)
        )
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// A fully assembled request, ready for dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    /// Endpoint label used for logs and metrics
    pub endpoint: String,
    /// HTTP method
    pub method: Method,
    /// Absolute URL (path-embedded terms already encoded into it)
    pub url: String,
    /// Request headers, including the assembled `cookie` header
    pub headers: Vec<(String, String)>,
    /// Query string pairs (GET)
    pub query: Vec<(String, String)>,
    /// Form body pairs (POST)
    pub form: Option<Vec<(String, String)>>,
    /// Carries credentials; request and response are never dumped to logs
    pub sensitive: bool,
}

impl PreparedRequest {
    /// Value of a request header (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Raw response as received from the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// Status code of the final response (after redirects)
    pub status: u16,
    /// Headers of the final response, names lowercased
    pub headers: Vec<(String, String)>,
    /// Headers of the last request actually sent, names lowercased
    pub sent_headers: Vec<(String, String)>,
    /// Response body text
    pub body: String,
}

impl RawResponse {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First value of a response header (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Every value of a response header (case-insensitive), in order
    pub fn header_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of a header on the request that produced this response
    pub fn sent_header(&self, name: &str) -> Option<&str> {
        find_header(&self.sent_headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Reduce a `Set-Cookie` value to its `name=value` pair, dropping attributes
pub(crate) fn cookie_pair(set_cookie: &str) -> Option<(String, String)> {
    let pair = set_cookie.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}
