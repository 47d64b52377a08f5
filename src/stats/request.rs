//! Request assembly
//!
//! [`RequestBuilder`] turns an endpoint, its form data and per-call
//! [`RequestOptions`] into a [`PreparedRequest`] for the transport:
//!
//! - POST with a form body, unless the call asks for GET or carries no data
//! - GET with the data as a query string otherwise
//! - Path-embedded endpoints encode their data into the URL and are always GET
//!
//! The `cookie` header starts from the session cookie, is overridden by an
//! explicit `cookie` in the option headers, and then gets each option cookie
//! appended as `key=value`.

use reqwest::Method;
use url::Url;

use super::endpoints::{DecodeMode, EndpointSpec};
use crate::transport::{PreparedRequest, TransportError, TransportResult};
use crate::Session;

/// Form fields of one call, in order
pub type FormData = Vec<(String, String)>;

/// Build one form field
pub fn field(name: &str, value: impl ToString) -> (String, String) {
    (name.to_string(), value.to_string())
}

/// Per-call request options
///
/// Defaults: POST, not a login, JSON decoding, no extra headers or cookies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// Send data as a query string
    pub use_get: bool,
    /// Login handshake (credentials in the body, never logged)
    pub is_login_request: bool,
    /// Response decoding
    pub decode: DecodeMode,
    /// Extra headers; replace same-named headers
    pub headers: Vec<(String, String)>,
    /// Extra cookies appended to the cookie header, in order
    pub cookies: Vec<(String, String)>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            use_get: false,
            is_login_request: false,
            decode: DecodeMode::Json,
            headers: Vec::new(),
            cookies: Vec::new(),
        }
    }
}

impl RequestOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Options declared by `endpoint`
    pub fn for_endpoint(endpoint: &EndpointSpec) -> Self {
        Self {
            use_get: endpoint.use_get,
            is_login_request: endpoint.login,
            decode: endpoint.decode,
            ..Self::default()
        }
    }

    /// Send data as a query string
    pub fn with_get(mut self, use_get: bool) -> Self {
        self.use_get = use_get;
        self
    }

    /// Mark as the login request
    pub fn with_login(mut self, is_login_request: bool) -> Self {
        self.is_login_request = is_login_request;
        self
    }

    /// Set the decode mode
    pub fn with_decode(mut self, decode: DecodeMode) -> Self {
        self.decode = decode;
        self
    }

    /// Set a header, replacing one with the same name
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    /// Append a cookie, replacing one with the same name
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.cookies.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.cookies.push((name, value)),
        }
        self
    }
}

/// Assembles requests against one base URL and, once logged in, one session
#[derive(Debug, Clone)]
pub struct RequestBuilder<'a> {
    base_url: &'a str,
    session: Option<&'a Session>,
}

impl<'a> RequestBuilder<'a> {
    /// Builder for `base_url`; `session` supplies the cookie header
    pub fn new(base_url: &'a str, session: Option<&'a Session>) -> Self {
        Self { base_url, session }
    }

    /// Assemble one request
    ///
    /// # Arguments
    /// * `endpoint` - Endpoint to call
    /// * `data` - Form fields; `None` means a bare GET
    /// * `options` - Per-call options
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidRequest`] if the base URL and path do not
    /// form a valid URL
    pub fn build(
        &self,
        endpoint: &EndpointSpec,
        data: Option<FormData>,
        options: &RequestOptions,
    ) -> TransportResult<PreparedRequest> {
        let mut url = self.endpoint_url(endpoint)?;

        let (method, query, form) = match data {
            Some(data) if endpoint.embed_in_path => {
                url.set_query(Some(&encode_pairs(&data)));
                (Method::GET, Vec::new(), None)
            }
            Some(data) if options.use_get => (Method::GET, data, None),
            Some(data) => (Method::POST, Vec::new(), Some(data)),
            None => (Method::GET, Vec::new(), None),
        };

        Ok(PreparedRequest {
            endpoint: endpoint.name.to_string(),
            method,
            url: url.to_string(),
            headers: self.headers(options),
            query,
            form,
            sensitive: options.is_login_request,
        })
    }

    fn endpoint_url(&self, endpoint: &EndpointSpec) -> TransportResult<Url> {
        let base = Url::parse(self.base_url)
            .map_err(|e| TransportError::InvalidRequest(format!("base URL {}: {e}", self.base_url)))?;
        base.join(endpoint.path)
            .map_err(|e| TransportError::InvalidRequest(format!("path {}: {e}", endpoint.path)))
    }

    fn headers(&self, options: &RequestOptions) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = Vec::new();

        if let Some(session) = self.session {
            headers.push(("cookie".to_string(), session.cookie().to_string()));
        }

        for (name, value) in &options.headers {
            match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
                Some(slot) => slot.1 = value.clone(),
                None => headers.push((name.to_ascii_lowercase(), value.clone())),
            }
        }

        if !options.cookies.is_empty() {
            let position = headers
                .iter()
                .position(|(k, _)| k.eq_ignore_ascii_case("cookie"));
            let mut cookie = position
                .map(|i| headers[i].1.clone())
                .unwrap_or_default();
            for (name, value) in &options.cookies {
                if !cookie.is_empty() {
                    cookie.push_str("; ");
                }
                cookie.push_str(name);
                cookie.push('=');
                cookie.push_str(value);
            }
            match position {
                Some(i) => headers[i].1 = cookie,
                None => headers.push(("cookie".to_string(), cookie)),
            }
        }

        headers
    }
}

fn encode_pairs(data: &[(String, String)]) -> String {
    data.iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
