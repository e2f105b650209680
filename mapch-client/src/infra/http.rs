//! Transport seam: plain request/response values plus the trait every HTTP
//! backend implements. Production uses [`ReqwestTransport`]; tests script
//! responses through the stub in `infra::testing`.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

pub const HEADER_ACCEPT: &str = "Accept";
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_METHOD_OVERRIDE: &str = "X-HTTP-Method-Override";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A file attached to a multipart body.
#[derive(Clone, PartialEq, Eq)]
pub struct FilePart {
    pub filename: String,
    pub mime: String,
    pub data: Vec<u8>,
}

impl FilePart {
    pub fn new(
        filename: impl Into<String>,
        mime: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            mime: mime.into(),
            data,
        }
    }
}

impl fmt::Debug for FilePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilePart")
            .field("filename", &self.filename)
            .field("mime", &self.mime)
            .field("len", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MultipartPart {
    Text { name: String, value: String },
    File { name: String, file: FilePart },
}

impl MultipartPart {
    pub fn name(&self) -> &str {
        match self {
            MultipartPart::Text { name, .. }
            | MultipartPart::File { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded`; keys may repeat.
    Form(Vec<(String, String)>),
    Multipart(Vec<MultipartPart>),
}

impl RequestBody {
    /// Text value of the first form or multipart field called `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        match self {
            RequestBody::Form(pairs) => pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            RequestBody::Multipart(parts) => {
                parts.iter().find_map(|part| match part {
                    MultipartPart::Text { name: n, value } if n == name => {
                        Some(value.as_str())
                    }
                    _ => None,
                })
            }
            RequestBody::Json(value) => {
                value.get(name).and_then(|v| v.as_str())
            }
            RequestBody::Empty => None,
        }
    }

    /// Names of the file parts in a multipart body.
    pub fn file_fields(&self) -> Vec<&str> {
        match self {
            RequestBody::Multipart(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    MultipartPart::File { name, .. } => Some(name.as_str()),
                    MultipartPart::Text { .. } => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// A fully formed outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url, timeout: Duration) -> Self {
        Self {
            method,
            url,
            headers: vec![(
                HEADER_ACCEPT.to_string(),
                "application/json".to_string(),
            )],
            body: RequestBody::Empty,
            timeout,
        }
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Attach `Authorization: Bearer`; blank tokens are ignored.
    pub fn bearer(self, token: Option<&str>) -> Self {
        match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => {
                self.header(HEADER_AUTHORIZATION, format!("Bearer {token}"))
            }
            None => self,
        }
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn query_pair(mut self, key: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(key, value);
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `METHOD path?query`, used in logs and probe summaries.
    pub fn label(&self) -> String {
        match self.url.query() {
            Some(query) => {
                format!("{} {}?{}", self.method, self.url.path(), query)
            }
            None => format!("{} {}", self.method, self.url.path()),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Failures below the HTTP layer. A response with any status, including
/// 5xx, is not a transport error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    TimedOut,
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("not connected to the network")]
    NotConnected,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(
        &self,
        request: HttpRequest,
    ) -> Result<HttpResponse, TransportError>;
}

/// [`HttpTransport`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("mapch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn build(
        &self,
        request: HttpRequest,
    ) -> Result<reqwest::RequestBuilder, TransportError> {
        let mut builder = self
            .client
            .request(request.method.into(), request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(pairs) => builder.form(&pairs),
            RequestBody::Multipart(parts) => {
                let mut form = reqwest::multipart::Form::new();
                for part in parts {
                    form = match part {
                        MultipartPart::Text { name, value } => {
                            form.text(name, value)
                        }
                        MultipartPart::File { name, file } => {
                            let piece =
                                reqwest::multipart::Part::bytes(file.data)
                                    .file_name(file.filename)
                                    .mime_str(&file.mime)
                                    .map_err(|e| {
                                        TransportError::InvalidRequest(
                                            e.to_string(),
                                        )
                                    })?;
                            form.part(name, piece)
                        }
                    };
                }
                builder.multipart(form)
            }
        };
        Ok(builder)
    }
}

fn classify_reqwest(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::TimedOut
    } else if err.is_builder() {
        TransportError::InvalidRequest(err.to_string())
    } else if err.is_connect() {
        TransportError::NotConnected
    } else {
        TransportError::ConnectionLost(err.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: HttpRequest,
    ) -> Result<HttpResponse, TransportError> {
        let response = self
            .build(request)?
            .send()
            .await
            .map_err(classify_reqwest)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify_reqwest)?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("valid url")
    }

    #[test]
    fn header_replaces_case_insensitively() {
        let request = HttpRequest::new(
            Method::Get,
            url("https://x.test/a"),
            Duration::from_secs(1),
        )
        .header("accept", "text/plain");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header_value("Accept"), Some("text/plain"));
    }

    #[test]
    fn blank_bearer_is_ignored() {
        let base = HttpRequest::new(
            Method::Post,
            url("https://x.test/a"),
            Duration::from_secs(1),
        );
        let blank = base.clone().bearer(Some("  "));
        assert!(blank.header_value(HEADER_AUTHORIZATION).is_none());
        assert_eq!(
            base.bearer(Some("tok")).header_value(HEADER_AUTHORIZATION),
            Some("Bearer tok")
        );
    }

    #[test]
    fn label_includes_query() {
        let request = HttpRequest::new(
            Method::Get,
            url("https://x.test/api/posts"),
            Duration::from_secs(1),
        )
        .query_pair("spot_id", "4");
        assert_eq!(request.label(), "GET /api/posts?spot_id=4");
    }

    #[test]
    fn body_field_lookup_covers_form_and_multipart() {
        let form = RequestBody::Form(vec![("_method".into(), "PATCH".into())]);
        assert_eq!(form.field("_method"), Some("PATCH"));

        let multipart = RequestBody::Multipart(vec![
            MultipartPart::Text {
                name: "spot_name".into(),
                value: "Tower".into(),
            },
            MultipartPart::File {
                name: "photo[]".into(),
                file: FilePart::new("a.jpg", "image/jpeg", vec![1, 2]),
            },
        ]);
        assert_eq!(multipart.field("spot_name"), Some("Tower"));
        assert_eq!(multipart.file_fields(), vec!["photo[]"]);
    }
}
