//! Login handshake
//!
//! The member site has no token API. Logging in posts the login form, follows
//! the redirects, and derives the session from what comes back:
//!
//! 1. The cookie is the `Set-Cookie` pairs of the final response, then `;`,
//!    then the `cookie` header of the last request actually sent. The session
//!    marker is set on a redirect hop and only reappears in that request header.
//! 2. The cookie must contain `irsso_members`; otherwise the credentials were
//!    rejected even though the status was 200.
//! 3. The customer id and the reference tables are scraped from the body.
//!
//! # State machine
//!
//! `Unauthenticated → Authenticating → Authenticated | Failed`. Both outcomes
//! are terminal; an [`Authenticator`] logs in at most once.

use std::sync::Arc;
use tracing::{info, warn};

use super::endpoints::LOGIN;
use super::reference::{ReferenceCache, ReferenceError};
use super::request::{field, RequestBuilder, RequestOptions};
use super::scrape::{extract_customer_id, ScrapeError};
use crate::transport::{cookie_pair, RawResponse, ThrottledTransport, TransportError};
use crate::Session;

/// Substring the assembled cookie must contain after a successful login
pub const SESSION_MARKER: &str = "irsso_members";

/// UTC offset (minutes) sent with the login form
pub const LOGIN_UTC_OFFSET: i32 = 300;

/// Authentication errors. All are fatal for the client being built.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Login answered with a non-success status
    #[error("login rejected with HTTP status {status}")]
    Rejected {
        /// Status code
        status: u16,
    },

    /// Cookie lacks the session marker: bad credentials
    #[error("invalid login for {username}")]
    MissingSessionMarker {
        /// Username that failed
        username: String,
    },

    /// Customer id could not be read from the home page
    #[error("could not read customer id: {0}")]
    CustomerId(#[source] ScrapeError),

    /// A reference table could not be read from the home page
    #[error(transparent)]
    ReferenceData(#[from] ReferenceError),

    /// Login request failed before a response arrived
    #[error("login request failed: {0}")]
    Transport(#[source] TransportError),

    /// Authenticator already ran
    #[error("authenticator is {0:?}; a new one is needed to log in again")]
    AlreadyAttempted(AuthState),
}

/// Result type for authentication
pub type AuthResult<T> = Result<T, AuthError>;

/// Authenticator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No attempt yet
    Unauthenticated,
    /// Login in progress
    Authenticating,
    /// Session established
    Authenticated,
    /// Login failed; no retry
    Failed,
}

/// Everything a successful login produces
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Session cookie and customer id
    pub session: Session,
    /// Reference tables from the home page
    pub reference: ReferenceCache,
}

/// Performs the login handshake once
pub struct Authenticator {
    transport: Arc<ThrottledTransport>,
    base_url: String,
    state: AuthState,
}

impl Authenticator {
    /// Authenticator sending through `transport` to `base_url`
    pub fn new(transport: Arc<ThrottledTransport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            state: AuthState::Unauthenticated,
        }
    }

    /// Current state
    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Log in and derive the session and reference tables
    ///
    /// # Errors
    /// - [`AuthError::Rejected`] for a non-2xx login response
    /// - [`AuthError::MissingSessionMarker`] when the cookie lacks the marker
    /// - [`AuthError::CustomerId`] / [`AuthError::ReferenceData`] when the home page
    ///   cannot be scraped
    /// - [`AuthError::Transport`] for timeouts, network errors and shutdown
    /// - [`AuthError::AlreadyAttempted`] if this authenticator already ran
    pub async fn authenticate(&mut self, username: &str, password: &str) -> AuthResult<LoginOutcome> {
        if self.state != AuthState::Unauthenticated {
            return Err(AuthError::AlreadyAttempted(self.state));
        }

        self.state = AuthState::Authenticating;
        info!(username = %username, "Logging in");

        match self.login(username, password).await {
            Ok(outcome) => {
                self.state = AuthState::Authenticated;
                info!(
                    username = %username,
                    customer_id = outcome.session.customer_id(),
                    "Authenticated"
                );
                Ok(outcome)
            }
            Err(e) => {
                self.state = AuthState::Failed;
                warn!(username = %username, error = %e, "Login failed");
                Err(e)
            }
        }
    }

    async fn login(&self, username: &str, password: &str) -> AuthResult<LoginOutcome> {
        let data = vec![
            field("username", username),
            field("password", password),
            field("utcoffset", LOGIN_UTC_OFFSET),
            field("todaysdate", ""),
        ];
        let options = RequestOptions::for_endpoint(&LOGIN);
        let request = RequestBuilder::new(&self.base_url, None)
            .build(&LOGIN, Some(data), &options)
            .map_err(AuthError::Transport)?;

        let raw = self.transport.send(request).await.map_err(|e| match e {
            TransportError::HttpStatus { status, .. } => AuthError::Rejected { status },
            other => AuthError::Transport(other),
        })?;

        let cookie = assemble_cookie(&raw);
        if !cookie.contains(SESSION_MARKER) {
            return Err(AuthError::MissingSessionMarker {
                username: username.to_string(),
            });
        }

        let customer_id = extract_customer_id(&raw.body).map_err(AuthError::CustomerId)?;
        let reference = ReferenceCache::populate(&raw.body)?;

        Ok(LoginOutcome {
            session: Session::new(cookie, customer_id),
            reference,
        })
    }
}

/// Session cookie from a login response
///
/// `Set-Cookie` pairs of the final response joined with `; `, then `;` and the
/// `cookie` header of the request that produced it. Empty when the response set
/// no cookies.
pub fn assemble_cookie(raw: &RawResponse) -> String {
    let pairs: Vec<String> = raw
        .header_all("set-cookie")
        .filter_map(cookie_pair)
        .map(|(name, value)| format!("{name}={value}"))
        .collect();

    if pairs.is_empty() {
        return String::new();
    }

    let mut cookie = pairs.join("; ");
    if let Some(sent) = raw.sent_header("cookie") {
        cookie.push(';');
        cookie.push_str(sent);
    }
    cookie
}
