//! CLI command implementations
//!
//! A thin surface over [`Stats`](crate::Stats): log in with the global
//! credentials, run one subcommand, print its result as JSON.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::stats::endpoints::DEFAULT_BASE_URL;
use crate::transport::config::{DEFAULT_DISPATCH_DELAY_MS, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::{ClientConfig, TransportConfig};

pub mod commands;
pub mod error;

pub use commands::Commands;
pub use error::CliError;

/// iRacing member-site stats client
#[derive(Parser, Debug)]
#[command(name = "irace-stats", version, about)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Member site username (email)
    #[arg(long, global = true, env = "IRACING_USERNAME", default_value = "")]
    pub username: String,

    /// Member site password
    #[arg(long, global = true, env = "IRACING_PASSWORD", hide_env_values = true, default_value = "")]
    pub password: String,

    /// Backend base URL
    #[arg(long, global = true, env = "IRACING_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Minimum delay between requests, in milliseconds
    #[arg(long, global = true, default_value_t = DEFAULT_DISPATCH_DELAY_MS)]
    pub dispatch_delay_ms: u64,

    /// Per-request timeout, in seconds (1-300)
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..=300)
    )]
    pub timeout_secs: u64,

    /// Pretty-print JSON output
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Debug logging (request and response dumps)
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    /// Client configuration from the global flags
    pub fn client_config(&self) -> ClientConfig {
        let transport = TransportConfig::default()
            .with_dispatch_delay(Duration::from_millis(self.dispatch_delay_ms))
            .with_request_timeout(Duration::from_secs(self.timeout_secs));
        ClientConfig::new()
            .with_base_url(self.base_url.as_str())
            .with_transport(transport)
    }

    /// Credentials, rejecting empty ones before any request is made
    ///
    /// # Errors
    /// Returns [`CliError::ConfigurationError`] if either value is empty
    pub fn credentials(&self) -> Result<(&str, &str), CliError> {
        if self.username.trim().is_empty() {
            return Err(CliError::ConfigurationError(
                "username is required (--username or IRACING_USERNAME)".to_string(),
            ));
        }
        if self.password.is_empty() {
            return Err(CliError::ConfigurationError(
                "password is required (--password or IRACING_PASSWORD)".to_string(),
            ));
        }
        Ok((self.username.as_str(), self.password.as_str()))
    }
}
