pub mod boards;
pub mod posts;
pub mod spots;
pub mod users;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use thiserror::Error;
use tokio::sync::RwLock;
use url::Url;

use mapch_config::Config;

use super::executor::{RequestExecutor, RequestFailure};
use super::http::{HttpRequest, HttpResponse, HttpTransport, Method};
use super::probe::{
    AggregatedFailure, CandidateProbe, CandidateRequest, Payload,
};

pub use boards::{BoardPage, BoardQuery, BoardsApi};
pub use posts::PostsApi;
pub use spots::{NewSpot, PhotoEdit, SpotSource, SpotUpdate, SpotsApi};
pub use users::UsersApi;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Request(#[from] RequestFailure),

    #[error("no endpoint accepted the request: {0}")]
    Probe(#[from] AggregatedFailure),

    #[error("invalid URL for '{path}': {source}")]
    InvalidUrl {
        path: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to decode {what}: {message}")]
    Decode { what: &'static str, message: String },

    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Request(failure) => failure.status(),
            ApiError::Probe(failure) => failure.last_status,
            _ => None,
        }
    }

    /// Whether the failure happened before any HTTP exchange.
    pub fn is_transport(&self) -> bool {
        match self {
            ApiError::Request(failure) => failure.is_transport(),
            ApiError::Probe(failure) => failure.is_transport(),
            _ => false,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Shared HTTP plumbing for the backend surfaces: base URLs, timeouts, the
/// executor/probe pair and the bearer token used by authenticated reads.
#[derive(Clone)]
pub struct ApiClient {
    base_url: Url,
    image_base_url: Url,
    registration_path: String,
    read_timeout: Duration,
    write_timeout: Duration,
    probe: CandidateProbe,
    token_store: Arc<RwLock<Option<String>>>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field(
                "has_token",
                &self
                    .token_store
                    .try_read()
                    .map(|t| t.is_some())
                    .unwrap_or(false),
            )
            .finish()
    }
}

impl ApiClient {
    pub fn new(config: &Config, transport: Arc<dyn HttpTransport>) -> Self {
        let executor = RequestExecutor::from_config(transport, &config.http);
        info!(
            "[ApiClient] Creating API client with base URL: {}",
            config.api.base_url
        );
        Self {
            base_url: config.api.base_url.clone(),
            image_base_url: config.api.image_base_url.clone(),
            registration_path: config.api.registration_path.clone(),
            read_timeout: config.http.read_timeout,
            write_timeout: config.http.write_timeout,
            probe: CandidateProbe::new(executor),
            token_store: Arc::new(RwLock::new(None)),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn image_base_url(&self) -> &Url {
        &self.image_base_url
    }

    pub fn registration_path(&self) -> &str {
        &self.registration_path
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    pub fn executor(&self) -> &RequestExecutor {
        self.probe.executor()
    }

    pub fn probe(&self) -> &CandidateProbe {
        &self.probe
    }

    pub async fn set_token(&self, token: Option<String>) {
        *self.token_store.write().await = token;
    }

    pub async fn token(&self) -> Option<String> {
        self.token_store.read().await.clone()
    }

    /// Resolve `path` against the API base. Absolute URLs pass through.
    pub fn build_url(&self, path: &str) -> ApiResult<Url> {
        let parsed = if path.starts_with("http://")
            || path.starts_with("https://")
        {
            Url::parse(path)
        } else {
            self.base_url.join(path.trim_start_matches('/'))
        };
        parsed.map_err(|source| ApiError::InvalidUrl {
            path: path.to_string(),
            source,
        })
    }

    /// A read-class request with the read timeout.
    pub fn read(&self, method: Method, path: &str) -> ApiResult<HttpRequest> {
        Ok(HttpRequest::new(
            method,
            self.build_url(path)?,
            self.read_timeout,
        ))
    }

    /// A write-class request with the write timeout.
    pub fn write(&self, method: Method, path: &str) -> ApiResult<HttpRequest> {
        Ok(HttpRequest::new(
            method,
            self.build_url(path)?,
            self.write_timeout,
        ))
    }

    /// Candidate request with `payload` in its encoding, read timeout.
    pub fn read_candidate(
        &self,
        candidate: &CandidateRequest,
        payload: &Payload,
    ) -> Result<HttpRequest, RequestFailure> {
        Ok(candidate
            .prepare(&self.base_url, self.read_timeout)?
            .body(candidate.encode(payload)))
    }

    /// Candidate request with `payload` in its encoding, write timeout.
    pub fn write_candidate(
        &self,
        candidate: &CandidateRequest,
        payload: &Payload,
    ) -> Result<HttpRequest, RequestFailure> {
        Ok(candidate
            .prepare(&self.base_url, self.write_timeout)?
            .body(candidate.encode(payload)))
    }

    pub async fn send(&self, request: HttpRequest) -> ApiResult<HttpResponse> {
        Ok(self.executor().execute(request).await?)
    }

    /// Resolve a photo path from the backend to a fetchable URL.
    ///
    /// Paths with a scheme are used as-is; anything else is taken relative
    /// to the image bucket root.
    pub fn resolve_image_url(&self, path: &str) -> Option<Url> {
        resolve_image_url(&self.image_base_url, path)
    }
}

pub fn resolve_image_url(image_base: &Url, path: &str) -> Option<Url> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(absolute) = Url::parse(trimmed) {
        return Some(absolute);
    }
    let rooted = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };
    image_base.join(&rooted).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket() -> Url {
        Url::parse("https://bucket.test/").expect("url")
    }

    #[test]
    fn relative_photo_paths_resolve_against_bucket() {
        let url = resolve_image_url(&bucket(), " photo/a b.jpg ")
            .expect("resolves");
        assert_eq!(url.as_str(), "https://bucket.test/photo/a%20b.jpg");
    }

    #[test]
    fn absolute_photo_urls_pass_through() {
        let url = resolve_image_url(&bucket(), "https://cdn.test/x.png")
            .expect("resolves");
        assert_eq!(url.as_str(), "https://cdn.test/x.png");
        assert!(resolve_image_url(&bucket(), "   ").is_none());
    }
}
