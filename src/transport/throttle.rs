//! Rate-limited request dispatcher
//!
//! Submissions go into an unbounded FIFO channel drained by a single dispatcher
//! task. The dispatcher starts each request no sooner than `dispatch_delay`
//! after the previous one started, then waits for its response before taking
//! the next job, so the spacing holds for any number of concurrent callers.
//!
//! Callers wait on a oneshot reply bounded by `request_timeout`. A caller that
//! gives up drops its reply channel; the dispatcher notices and skips the job
//! instead of sending it.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use super::backend::{HttpBackend, ReqwestBackend};
use super::config::TransportConfig;
use super::shutdown::{ShutdownSignal, SharedShutdown};
use super::{PreparedRequest, RawResponse, TransportError, TransportResult};
use crate::metrics::{self, DispatchMetrics};

struct Job {
    request: PreparedRequest,
    reply: oneshot::Sender<TransportResult<RawResponse>>,
    submitted_at: Instant,
}

/// Shared, rate-limited transport
///
/// Open one per process (or per backend host) and hand clones of the `Arc` to
/// every client. Dropping the last reference shuts the dispatcher down.
pub struct ThrottledTransport {
    queue: mpsc::UnboundedSender<Job>,
    shutdown: SharedShutdown,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    config: TransportConfig,
}

impl ThrottledTransport {
    /// Open a transport backed by a pooled reqwest client
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built or no runtime is running
    pub fn open(config: TransportConfig) -> TransportResult<Arc<Self>> {
        let backend = Arc::new(ReqwestBackend::new(&config)?);
        Self::with_backend(config, backend)
    }

    /// Open a transport on a custom backend
    pub fn with_backend(
        config: TransportConfig,
        backend: Arc<dyn HttpBackend>,
    ) -> TransportResult<Arc<Self>> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime)?;

        let (queue, jobs) = mpsc::unbounded_channel();
        let shutdown = ShutdownSignal::shared();
        let dispatcher = runtime.spawn(dispatch_loop(
            jobs,
            backend,
            config.dispatch_delay,
            shutdown.clone(),
        ));

        debug!(
            dispatch_delay_ms = config.dispatch_delay.as_millis(),
            request_timeout_ms = config.request_timeout.as_millis(),
            "Throttled transport opened"
        );

        Ok(Arc::new(Self {
            queue,
            shutdown,
            dispatcher: Mutex::new(Some(dispatcher)),
            config,
        }))
    }

    /// Queue `request` and wait for its response
    ///
    /// # Errors
    /// - [`TransportError::Timeout`] if no response arrives within `request_timeout`
    /// - [`TransportError::HttpStatus`] for non-2xx responses
    /// - [`TransportError::Closed`] after shutdown
    pub async fn send(&self, request: PreparedRequest) -> TransportResult<RawResponse> {
        if self.shutdown.is_shutdown_requested() {
            return Err(TransportError::Closed);
        }

        let endpoint = request.endpoint.clone();
        let method = request.method.clone();
        let url = request.url.clone();
        let sensitive = request.sensitive;

        let (reply, response) = oneshot::channel();
        self.queue
            .send(Job {
                request,
                reply,
                submitted_at: Instant::now(),
            })
            .map_err(|_| TransportError::Closed)?;

        let raw = match tokio::time::timeout(self.config.request_timeout, response).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => return Err(TransportError::Closed),
            Err(_) => {
                metrics::record_timeout(&endpoint, self.config.request_timeout);
                return Err(TransportError::Timeout(self.config.request_timeout));
            }
        };

        if !sensitive {
            debug!(
                endpoint = %endpoint,
                method = %method,
                url = %url,
                status = raw.status,
                request_headers = ?redact_cookie(&raw.sent_headers),
                response_headers = ?raw.headers,
                body_len = raw.body.len(),
                "Response received"
            );
        }

        if !raw.is_success() {
            return Err(TransportError::HttpStatus {
                status: raw.status,
                body: raw.body,
            });
        }

        Ok(raw)
    }

    /// Stop the dispatcher. Queued and in-flight calls fail with `Closed`.
    ///
    /// Safe to call any number of times, from any thread.
    pub fn shutdown(&self) {
        if !self.shutdown.request_shutdown() {
            return;
        }

        info!("Shutting down throttled transport");
        if let Ok(mut dispatcher) = self.dispatcher.lock() {
            if let Some(handle) = dispatcher.take() {
                handle.abort();
            }
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_shutdown_requested()
    }

    /// Transport settings
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Drop for ThrottledTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn dispatch_loop(
    mut jobs: mpsc::UnboundedReceiver<Job>,
    backend: Arc<dyn HttpBackend>,
    delay: Duration,
    shutdown: SharedShutdown,
) {
    let mut last_dispatch: Option<Instant> = None;

    loop {
        let mut job = tokio::select! {
            biased;
            _ = shutdown.wait_for_shutdown() => break,
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        if let Some(last) = last_dispatch {
            tokio::select! {
                biased;
                _ = shutdown.wait_for_shutdown() => break,
                _ = sleep_until(last + delay) => {}
            }
        }

        if job.reply.is_closed() {
            debug!(endpoint = %job.request.endpoint, "Skipping abandoned request");
            continue;
        }

        let dispatched_at = Instant::now();
        last_dispatch = Some(dispatched_at);
        let timing = DispatchMetrics::start(
            job.request.endpoint.as_str(),
            dispatched_at.saturating_duration_since(job.submitted_at),
        );

        let result = tokio::select! {
            biased;
            _ = shutdown.wait_for_shutdown() => break,
            _ = job.reply.closed() => {
                debug!(endpoint = %job.request.endpoint, "Caller gave up on in-flight request");
                continue;
            }
            result = backend.execute(&job.request) => result,
        };

        match &result {
            Ok(raw) => timing.record_complete(raw.status),
            Err(e) => timing.record_network_error(&e.to_string()),
        }

        let _ = job.reply.send(result);
    }

    jobs.close();
    debug!("Dispatcher stopped");
}

/// Header list with the session cookie value masked, for logging
fn redact_cookie(headers: &[(String, String)]) -> Vec<(&str, &str)> {
    headers
        .iter()
        .map(|(name, value)| {
            if name.eq_ignore_ascii_case("cookie") {
                (name.as_str(), "<redacted>")
            } else {
                (name.as_str(), value.as_str())
            }
        })
        .collect()
}
