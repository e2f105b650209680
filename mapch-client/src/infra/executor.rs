use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;

use mapch_config::HttpConfig;

use super::http::{HttpRequest, HttpResponse, HttpTransport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Worth one more attempt: timeouts, dropped connections, 5xx.
    Transient,
    Permanent,
}

/// Outcome of a request that did not produce a usable 2xx response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestFailure {
    #[error("request timed out after {0:?}")]
    TimedOut(Duration),

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("not connected to the network")]
    NotConnected,

    #[error("server responded with status {status}")]
    Status { status: u16, body: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to decode response: {message}")]
    Decode {
        status: u16,
        message: String,
        body: String,
    },
}

impl RequestFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            RequestFailure::TimedOut(_)
            | RequestFailure::ConnectionLost(_)
            | RequestFailure::NotConnected => FailureKind::Transient,
            RequestFailure::Status { status, .. } if *status >= 500 => {
                FailureKind::Transient
            }
            RequestFailure::Status { .. }
            | RequestFailure::InvalidRequest(_)
            | RequestFailure::Decode { .. } => FailureKind::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == FailureKind::Transient
    }

    /// No HTTP exchange happened at all.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RequestFailure::TimedOut(_)
                | RequestFailure::ConnectionLost(_)
                | RequestFailure::NotConnected
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RequestFailure::Status { status, .. }
            | RequestFailure::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            RequestFailure::Status { body, .. }
            | RequestFailure::Decode { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn decode(response: &HttpResponse, err: impl fmt::Display) -> Self {
        RequestFailure::Decode {
            status: response.status,
            message: err.to_string(),
            body: response.text(),
        }
    }

    fn from_transport(err: TransportError, timeout: Duration) -> Self {
        match err {
            TransportError::TimedOut => RequestFailure::TimedOut(timeout),
            TransportError::ConnectionLost(msg) => {
                RequestFailure::ConnectionLost(msg)
            }
            TransportError::NotConnected => RequestFailure::NotConnected,
            TransportError::InvalidRequest(msg) => {
                RequestFailure::InvalidRequest(msg)
            }
        }
    }
}

/// Runs single requests through an [`HttpTransport`] with a hard timeout
/// and at most one retry for transient failures.
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    retry_backoff: Duration,
}

impl fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("retry_backoff", &self.retry_backoff)
            .finish_non_exhaustive()
    }
}

impl RequestExecutor {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            transport,
            retry_backoff,
        }
    }

    pub fn from_config(
        transport: Arc<dyn HttpTransport>,
        config: &HttpConfig,
    ) -> Self {
        Self::new(transport, config.retry_backoff)
    }

    pub fn retry_backoff(&self) -> Duration {
        self.retry_backoff
    }

    /// Execute with one retry after [`Self::retry_backoff`] when the first
    /// attempt fails transiently. A second failure is returned as-is.
    pub async fn execute(
        &self,
        request: HttpRequest,
    ) -> Result<HttpResponse, RequestFailure> {
        match self.execute_once(&request).await {
            Err(failure) if failure.is_transient() => {
                debug!(
                    "[RequestExecutor] {} failed transiently ({}), retrying in {:?}",
                    request.label(),
                    failure,
                    self.retry_backoff
                );
                tokio::time::sleep(self.retry_backoff).await;
                let result = self.execute_once(&request).await;
                if let Err(err) = &result {
                    warn!(
                        "[RequestExecutor] {} failed after retry: {}",
                        request.label(),
                        err
                    );
                }
                result
            }
            other => other,
        }
    }

    /// Single attempt. Non-2xx statuses come back as
    /// [`RequestFailure::Status`] with the raw body text.
    pub async fn execute_once(
        &self,
        request: &HttpRequest,
    ) -> Result<HttpResponse, RequestFailure> {
        let timeout = request.timeout;
        let sent =
            tokio::time::timeout(timeout, self.transport.send(request.clone()))
                .await;
        let response = match sent {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                return Err(RequestFailure::from_transport(err, timeout));
            }
            Err(_) => return Err(RequestFailure::TimedOut(timeout)),
        };

        if response.is_success() {
            Ok(response)
        } else {
            Err(RequestFailure::Status {
                status: response.status,
                body: response.text(),
            })
        }
    }
}
