//! HTTP backend seam
//!
//! [`HttpBackend`] is the only place bytes leave the process. The production
//! implementation wraps one pooled `reqwest::Client`; tests substitute their own
//! backend to observe dispatch timing without a network.
//!
//! Redirects are followed by hand rather than by reqwest. The login handshake
//! sets its session cookie on an intermediate redirect and the backend only
//! reveals it again through the `cookie` header of the follow-up request, so the
//! backend has to know exactly which headers went out on the last hop.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, COOKIE, LOCATION, SET_COOKIE};
use reqwest::{Client, Method, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use super::config::TransportConfig;
use super::{cookie_pair, PreparedRequest, RawResponse, TransportError, TransportResult};

/// Executes one prepared request
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// Send `request` and return the final response (after redirects)
    ///
    /// Non-success statuses are returned as responses, not errors; the
    /// transport decides how to surface them.
    async fn execute(&self, request: &PreparedRequest) -> TransportResult<RawResponse>;
}

/// Production backend on a pooled reqwest client
pub struct ReqwestBackend {
    client: Client,
    request_timeout: Duration,
    max_redirects: usize,
}

impl ReqwestBackend {
    /// Build the pooled client from transport settings
    ///
    /// # Errors
    /// Returns [`TransportError::Build`] if the TLS backend cannot be initialised
    pub fn new(config: &TransportConfig) -> TransportResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        Ok(Self {
            client,
            request_timeout: config.request_timeout,
            max_redirects: config.max_redirects,
        })
    }

    fn classify(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.request_timeout)
        } else {
            TransportError::Network(error.to_string())
        }
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn execute(&self, request: &PreparedRequest) -> TransportResult<RawResponse> {
        let base_cookie = request.header(COOKIE.as_str()).unwrap_or_default().to_string();
        let mut redirect_cookies: Vec<(String, String)> = Vec::new();
        let mut method = request.method.clone();
        let mut url = request.url.clone();
        let mut first_hop = true;

        for hop in 0..=self.max_redirects {
            let mut builder = self.client.request(method.clone(), url.as_str());

            for (name, value) in &request.headers {
                if !name.eq_ignore_ascii_case(COOKIE.as_str()) {
                    builder = builder.header(name.as_str(), value.as_str());
                }
            }

            let cookie = merge_cookies(&base_cookie, &redirect_cookies);
            if !cookie.is_empty() {
                builder = builder.header(COOKIE, cookie);
            }

            if first_hop && !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if method == Method::POST {
                if let Some(form) = &request.form {
                    builder = builder.form(form);
                }
            }

            let built = builder
                .build()
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            let sent_headers = header_pairs(built.headers());

            let response = self.client.execute(built).await.map_err(|e| self.classify(e))?;
            let status = response.status();
            let headers = header_pairs(response.headers());

            if status.is_redirection() {
                if let Some(location) = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                {
                    let next = response
                        .url()
                        .join(location)
                        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

                    for value in response.headers().get_all(SET_COOKIE) {
                        if let Some(pair) = value.to_str().ok().and_then(cookie_pair) {
                            remember_cookie(&mut redirect_cookies, pair);
                        }
                    }

                    debug!(hop = hop + 1, status = status.as_u16(), location = %next, "Following redirect");

                    if !keeps_method(status) {
                        method = Method::GET;
                    }
                    url = next.to_string();
                    first_hop = false;
                    continue;
                }
            }

            let body = response.text().await.map_err(|e| self.classify(e))?;

            return Ok(RawResponse {
                status: status.as_u16(),
                headers,
                sent_headers,
                body,
            });
        }

        warn!(
            "Redirect limit ({}) exceeded for {}",
            self.max_redirects, request.endpoint
        );
        Err(TransportError::Network(format!(
            "redirect limit ({}) exceeded",
            self.max_redirects
        )))
    }
}

/// 307/308 replay the original method and body; the other redirects become GET
fn keeps_method(status: StatusCode) -> bool {
    status == StatusCode::TEMPORARY_REDIRECT || status == StatusCode::PERMANENT_REDIRECT
}

fn remember_cookie(jar: &mut Vec<(String, String)>, (name, value): (String, String)) {
    match jar.iter_mut().find(|(k, _)| *k == name) {
        Some(slot) => slot.1 = value,
        None => jar.push((name, value)),
    }
}

fn merge_cookies(base: &str, jar: &[(String, String)]) -> String {
    let mut cookie = base.to_string();
    for (name, value) in jar {
        if !cookie.is_empty() {
            cookie.push_str("; ");
        }
        cookie.push_str(name);
        cookie.push('=');
        cookie.push_str(value);
    }
    cookie
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}
