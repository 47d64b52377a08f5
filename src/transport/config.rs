//! Transport configuration and defaults

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Minimum spacing between two dispatches, in milliseconds.
/// The member site starts refusing sessions that hammer it; 100ms keeps a
/// single process comfortably under that threshold.
pub const DEFAULT_DISPATCH_DELAY_MS: u64 = 100;

/// Bound on one call (queue wait plus response), in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Time allowed to establish a TCP/TLS connection, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Redirect hops followed during one request (login bounces through several).
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Throttled transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Minimum time between successive dispatches
    #[serde(default = "default_dispatch_delay")]
    pub dispatch_delay: Duration,

    /// Per-call bound covering queue wait and response
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,

    /// Connection establishment timeout
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum redirect hops per request
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            dispatch_delay: default_dispatch_delay(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl TransportConfig {
    /// Create a config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dispatch spacing
    pub fn with_dispatch_delay(mut self, delay: Duration) -> Self {
        self.dispatch_delay = delay;
        self
    }

    /// Set the per-call timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the redirect limit
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }
}

fn default_dispatch_delay() -> Duration {
    Duration::from_millis(DEFAULT_DISPATCH_DELAY_MS)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)
}

fn default_user_agent() -> String {
    format!("irace-stats/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_redirects() -> usize {
    DEFAULT_MAX_REDIRECTS
}
