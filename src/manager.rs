use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use tokio::runtime::{Builder, Runtime};

use crate::error::ConfigError;
use crate::guard;
use crate::sink::IngestSink;
use crate::status::Status;
use crate::tls::TlsPolicy;

/// Connect and request timeout used unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// `User-Agent` sent with every request.
pub const AGENT: &str = concat!("tracing-log-ingest/", env!("CARGO_PKG_VERSION"));

const MASKED_TOKEN: &str = "########";

/// Worker threads of the runtime owned by each manager.
const WORKER_THREADS: usize = 2;

/// Extra wait on top of the request timeout before a caller gives up on a
/// response that the runtime never delivered.
const RESPONSE_GRACE: Duration = Duration::from_secs(1);

/// Identity of an ingest endpoint: where to send, how to authenticate and
/// how to treat its certificate.
///
/// Two configs are equal only when every field, including the token, is
/// equal. `Debug` and `Display` never print the token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ManagerConfig {
    endpoint: Url,
    token: String,
    tls: TlsPolicy,
}

impl ManagerConfig {
    /// Validate and build a config.
    ///
    /// **Errors**
    /// - [`ConfigError::MissingEndpoint`] / [`ConfigError::InvalidEndpoint`] /
    ///   [`ConfigError::UnsupportedScheme`] when `endpoint` is blank, does not
    ///   parse, or is not `http`/`https`.
    /// - [`ConfigError::MissingToken`] when `token` is blank.
    pub fn new(endpoint: &str, token: impl Into<String>, tls: TlsPolicy) -> Result<Self, ConfigError> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        let endpoint = Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint(e.to_string()))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(endpoint.scheme().to_string()));
        }

        let token = token.into();
        if token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }

        Ok(ManagerConfig { endpoint, token, tls })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn tls(&self) -> TlsPolicy {
        self.tls
    }
}

impl fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &MASKED_TOKEN)
            .field("tls", &self.tls)
            .finish()
    }
}

impl fmt::Display for ManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ManagerConfig[endpoint='{}', token='{}', tls={:?}]",
            self.endpoint, MASKED_TOKEN, self.tls
        )
    }
}

/// Lifecycle of an [`IngestManager`]. A manager is active as soon as its
/// client is built; there is no way back from `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Active,
    Stopped,
}

enum State {
    Active { runtime: Runtime, client: Client },
    Stopped,
}

/// Owner of one pooled HTTP client bound to one [`ManagerConfig`].
///
/// Requests run on a small tokio runtime owned by the manager, whose
/// threads are marked as emitting so that events raised by the HTTP stack
/// never come back into the pipeline. `send` submits the request to that
/// runtime and waits for the outcome on the calling thread, so it can be
/// called from plain threads and from inside any other tokio runtime alike.
/// Concurrent documents reach the endpoint in no particular order.
pub struct IngestManager {
    name: String,
    config: ManagerConfig,
    authorization: HeaderValue,
    timeout: Duration,
    state: RwLock<State>,
}

impl IngestManager {
    /// Create a manager with [`DEFAULT_TIMEOUT`].
    pub fn new(name: impl Into<String>, config: ManagerConfig) -> Result<Self, ConfigError> {
        Self::with_timeout(name, config, DEFAULT_TIMEOUT)
    }

    /// Create a manager whose connect and request timeouts are `timeout`.
    ///
    /// **Errors**
    /// - [`ConfigError::InvalidToken`] if the token cannot be sent as a
    ///   header value.
    /// - [`ConfigError::Client`] if the HTTP client cannot be built.
    /// - [`ConfigError::Runtime`] if the manager's runtime cannot start.
    pub fn with_timeout(
        name: impl Into<String>,
        config: ManagerConfig,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let name = name.into();

        let mut authorization =
            HeaderValue::from_str(&format!("Api-Token {}", config.token)).map_err(|_| ConfigError::InvalidToken)?;
        authorization.set_sensitive(true);

        let builder = Client::builder().connect_timeout(timeout).timeout(timeout);
        let client = config.tls.configure(builder).build()?;

        // Built last: a runtime must not be dropped on an error path that
        // may run inside another runtime.
        let runtime = Builder::new_multi_thread()
            .worker_threads(WORKER_THREADS)
            .thread_name(format!("ingest-{name}"))
            .on_thread_start(guard::mark_thread_emitting)
            .enable_all()
            .build()
            .map_err(ConfigError::Runtime)?;

        tracing::debug!(manager = %name, config = %config, ?timeout, "ingest manager created");

        Ok(IngestManager {
            name,
            config,
            authorization,
            timeout,
            state: RwLock::new(State::Active { runtime, client }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn state(&self) -> ManagerState {
        match *self.state.read() {
            State::Active { .. } => ManagerState::Active,
            State::Stopped => ManagerState::Stopped,
        }
    }

    /// POST `document` to the endpoint and classify the outcome.
    ///
    /// Blank documents short-circuit to [`Status::EmptyMessage`] without any
    /// network call. Failures are logged here and never returned as errors.
    pub fn send(&self, document: &str) -> Status {
        if document.trim().is_empty() {
            return Status::EmptyMessage;
        }

        let transport = match &*self.state.read() {
            State::Active { runtime, client } => Some((runtime.handle().clone(), client.clone())),
            State::Stopped => None,
        };
        let Some((handle, client)) = transport else {
            tracing::warn!(manager = %self.name, "ingest manager is stopped, log event dropped");
            return Status::Exception;
        };

        let request = client
            .post(self.config.endpoint.clone())
            .header(AUTHORIZATION, self.authorization.clone())
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(USER_AGENT, AGENT)
            .body(document.to_owned());

        let (done_tx, done_rx) = mpsc::sync_channel(1);
        handle.spawn(async move {
            let outcome = request.send().await.map(|response| response.status());
            let _ = done_tx.send(outcome);
        });

        match done_rx.recv_timeout(self.timeout + RESPONSE_GRACE) {
            Ok(Ok(status)) if matches!(status, StatusCode::OK | StatusCode::NO_CONTENT) => Status::Success,
            Ok(Ok(status)) => {
                tracing::warn!(
                    manager = %self.name,
                    status = status.as_u16(),
                    reason = status.canonical_reason().unwrap_or("<unknown>"),
                    "ingest endpoint rejected request"
                );
                Status::Failed
            }
            Ok(Err(e)) => {
                tracing::error!(
                    manager = %self.name,
                    kind = failure_kind(&e),
                    error = %e,
                    "cannot send log event"
                );
                Status::Exception
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::error!(manager = %self.name, kind = "timeout", "cannot send log event");
                Status::Exception
            }
            // The runtime was shut down while the request was in flight.
            Err(RecvTimeoutError::Disconnected) => {
                tracing::error!(manager = %self.name, kind = "stopped", "cannot send log event");
                Status::Exception
            }
        }
    }

    /// Shut the manager's runtime down, waiting at most `timeout` for
    /// in-flight requests.
    ///
    /// **Returns**
    /// - `true` if the manager was active and its runtime finished within
    ///   `timeout`.
    /// - `false` if the manager was already stopped or the shutdown did not
    ///   finish in time.
    pub fn stop(&self, timeout: Duration) -> bool {
        let runtime = match std::mem::replace(&mut *self.state.write(), State::Stopped) {
            State::Active { runtime, .. } => runtime,
            State::Stopped => return false,
        };

        // A runtime cannot be shut down with a timeout from inside another
        // runtime, so the wait happens on a helper thread.
        let (done_tx, done_rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name(format!("ingest-stop-{}", self.name))
            .spawn(move || {
                runtime.shutdown_timeout(timeout);
                let _ = done_tx.send(());
            });
        if let Err(e) = spawned {
            tracing::warn!(manager = %self.name, error = %e, "cannot spawn thread to shut down ingest runtime");
            return false;
        }

        let released = done_rx.recv_timeout(timeout + RESPONSE_GRACE).is_ok();
        tracing::debug!(manager = %self.name, released, "ingest manager stopped");
        released
    }
}

impl Drop for IngestManager {
    fn drop(&mut self) {
        if let State::Active { runtime, .. } = std::mem::replace(self.state.get_mut(), State::Stopped) {
            runtime.shutdown_background();
        }
    }
}

impl IngestSink for IngestManager {
    fn send(&self, document: &str) -> Status {
        IngestManager::send(self, document)
    }
}

impl fmt::Debug for IngestManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestManager")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("timeout", &self.timeout)
            .field("state", &self.state())
            .finish()
    }
}

fn failure_kind(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connect"
    } else if e.is_body() {
        "body"
    } else if e.is_request() {
        "request"
    } else {
        "other"
    }
}
