//! Stats backend client
//!
//! # Components
//!
//! - [`endpoints`] - Static endpoint registry (path, decode mode, failure policy)
//! - [`request`] - [`request::RequestOptions`] and request assembly
//! - [`decoder`] - Text / JSON / columnar decoding
//! - [`scrape`] - Script-variable parsers for HTML pages
//! - [`reference`] - Reference tables loaded at login
//! - [`auth`] - Login handshake
//! - [`pagination`] - Short-page pagination
//! - [`query`] - Search option types and their form fields
//! - [`client`] - The [`client::Stats`] facade
//!
//! # Error Handling
//!
//! Layers return their own error enums; [`StatsError`] wraps them for facade
//! callers. Listing endpoints with the
//! [`Enumeration`](endpoints::FailurePolicy::Enumeration) policy turn decode
//! and HTTP status failures into an empty page instead.

use crate::transport::TransportError;

pub mod auth;
pub mod client;
pub mod decoder;
pub mod endpoints;
pub mod pagination;
pub mod query;
pub mod reference;
pub mod request;
pub mod scrape;

pub use auth::AuthError;
pub use decoder::DecodeError;
pub use scrape::ScrapeError;

/// Stats client errors
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    /// Login failed; no client was built
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Request did not produce a successful response
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Response body did not match the endpoint's shape
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Page text did not contain the expected script data
    #[error("scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    /// Car id is not in the reference cars table
    #[error("car id not known: {0}")]
    UnknownCar(i64),

    /// Argument rejected before any request was made
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Pagination hit its page cap
    #[error("pagination stopped after {0} full pages")]
    PageLimit(u32),
}

impl StatsError {
    /// Whether an enumeration endpoint degrades this failure to an empty page
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            StatsError::Decode(_) | StatsError::Transport(TransportError::HttpStatus { .. })
        )
    }

    /// Whether re-issuing the same call may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            StatsError::Transport(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

/// Result type for stats operations
pub type StatsResult<T> = Result<T, StatsError>;
