//! Ordered endpoint probing for a backend whose exact routes, field names
//! and method handling are not known up front.
//!
//! A probe walks a fixed list of [`CandidateRequest`]s and returns the first
//! 2xx. Non-2xx answers move on to the next candidate; a failure with no
//! HTTP status at all (timeout, no connection) stops the walk, since a
//! different path will not fix the network.

use std::fmt;
use std::time::Duration;

use log::debug;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use super::executor::{RequestExecutor, RequestFailure};
use super::http::{
    FilePart, HEADER_METHOD_OVERRIDE, HttpRequest, HttpResponse, Method,
    MultipartPart, RequestBody,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoding {
    None,
    Json,
    Form,
    /// Files go under `file_field`; text fields are sent as plain parts.
    Multipart { file_field: String },
}

/// One way of reaching an operation on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRequest {
    pub path: String,
    pub method: Method,
    pub encoding: Encoding,
    /// Sent as `X-HTTP-Method-Override` for servers that tunnel verbs
    /// through POST.
    pub method_override: Option<Method>,
}

impl CandidateRequest {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        encoding: Encoding,
    ) -> Self {
        Self {
            path: path.into(),
            method,
            encoding,
            method_override: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, Encoding::None)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path, Encoding::None)
    }

    pub fn json(method: Method, path: impl Into<String>) -> Self {
        Self::new(method, path, Encoding::Json)
    }

    pub fn form(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path, Encoding::Form)
    }

    pub fn multipart(
        path: impl Into<String>,
        file_field: impl Into<String>,
    ) -> Self {
        Self::new(
            Method::Post,
            path,
            Encoding::Multipart {
                file_field: file_field.into(),
            },
        )
    }

    pub fn with_override(mut self, method: Method) -> Self {
        self.method_override = Some(method);
        self
    }

    pub fn label(&self) -> String {
        let mut label = format!("{} {}", self.method, self.path);
        if let Encoding::Multipart { file_field } = &self.encoding {
            label.push_str(&format!(" [{file_field}]"));
        }
        label
    }

    /// Start a request for this candidate against `base`: method, URL and
    /// the override header. The body is left to the caller.
    pub fn prepare(
        &self,
        base: &Url,
        timeout: Duration,
    ) -> Result<HttpRequest, RequestFailure> {
        let url =
            base.join(self.path.trim_start_matches('/')).map_err(|e| {
                RequestFailure::InvalidRequest(format!("{}: {e}", self.path))
            })?;
        let request = HttpRequest::new(self.method, url, timeout);
        Ok(match self.method_override {
            Some(method) => {
                request.header(HEADER_METHOD_OVERRIDE, method.as_str())
            }
            None => request,
        })
    }

    /// Render `payload` in this candidate's encoding.
    pub fn encode(&self, payload: &Payload) -> RequestBody {
        match &self.encoding {
            Encoding::None => RequestBody::Empty,
            Encoding::Json => RequestBody::Json(Value::Object(
                payload
                    .fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            )),
            Encoding::Form => RequestBody::Form(
                payload
                    .fields
                    .iter()
                    .map(|(k, v)| (k.clone(), field_text(v)))
                    .collect(),
            ),
            Encoding::Multipart { file_field } => {
                let mut parts: Vec<MultipartPart> = payload
                    .fields
                    .iter()
                    .map(|(k, v)| MultipartPart::Text {
                        name: k.clone(),
                        value: field_text(v),
                    })
                    .collect();
                parts.extend(payload.files.iter().map(|file| {
                    MultipartPart::File {
                        name: file_field.clone(),
                        file: file.clone(),
                    }
                }));
                RequestBody::Multipart(parts)
            }
        }
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Encoding-neutral request content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub fields: Vec<(String, Value)>,
    pub files: Vec<FilePart>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.push((name.to_string(), value.into()));
        self
    }

    pub fn field_opt<V: Into<Value>>(
        self,
        name: &str,
        value: Option<V>,
    ) -> Self {
        match value {
            Some(value) => self.field(name, value),
            None => self,
        }
    }

    pub fn files(mut self, files: impl IntoIterator<Item = FilePart>) -> Self {
        self.files.extend(files);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeAttempt {
    pub label: String,
    pub status: Option<u16>,
}

impl fmt::Display for ProbeAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} -> {status}", self.label),
            None => write!(f, "{} -> no response", self.label),
        }
    }
}

/// Every candidate failed, or the walk was cut short by a transport error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "{} candidate(s) tried, last status {last_status:?}",
    .attempts.len()
)]
pub struct AggregatedFailure {
    pub attempts: Vec<ProbeAttempt>,
    pub last_status: Option<u16>,
    pub last_body: Option<String>,
    /// Set when a transport failure stopped the probe early.
    pub aborted_by: Option<RequestFailure>,
}

impl AggregatedFailure {
    fn empty() -> Self {
        Self {
            attempts: Vec::new(),
            last_status: None,
            last_body: None,
            aborted_by: None,
        }
    }

    pub fn is_transport(&self) -> bool {
        self.aborted_by.is_some()
    }

    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn record(&mut self, label: String, failure: &RequestFailure) {
        self.attempts.push(ProbeAttempt {
            label,
            status: failure.status(),
        });
        // Status and body always describe the same response.
        if let Some(status) = failure.status() {
            self.last_status = Some(status);
            self.last_body = failure.body().map(str::to_string);
        }
    }
}

/// Candidate iteration over a [`RequestExecutor`].
#[derive(Debug, Clone)]
pub struct CandidateProbe {
    executor: RequestExecutor,
}

impl CandidateProbe {
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Return the first 2xx among `candidates`, in order.
    pub async fn probe<B>(
        &self,
        candidates: &[CandidateRequest],
        build: B,
    ) -> Result<HttpResponse, AggregatedFailure>
    where
        B: FnMut(&CandidateRequest) -> Result<HttpRequest, RequestFailure>,
    {
        self.probe_decode(candidates, build, |response| {
            Ok(response.clone())
        })
        .await
    }

    /// Like [`Self::probe`], but a 2xx only counts once `decode` accepts
    /// its body; otherwise probing continues with the next candidate.
    pub async fn probe_decode<T, B, D>(
        &self,
        candidates: &[CandidateRequest],
        mut build: B,
        mut decode: D,
    ) -> Result<T, AggregatedFailure>
    where
        B: FnMut(&CandidateRequest) -> Result<HttpRequest, RequestFailure>,
        D: FnMut(&HttpResponse) -> Result<T, RequestFailure>,
    {
        let mut failure = AggregatedFailure::empty();

        for candidate in candidates {
            let label = candidate.label();
            let request = match build(candidate) {
                Ok(request) => request,
                Err(err) => {
                    debug!("[CandidateProbe] {label}: could not build: {err}");
                    failure.record(label, &err);
                    continue;
                }
            };

            let outcome = self
                .executor
                .execute(request)
                .await
                .and_then(|response| decode(&response));

            match outcome {
                Ok(value) => {
                    debug!("[CandidateProbe] {label} accepted");
                    return Ok(value);
                }
                Err(err) if err.is_transport() => {
                    debug!("[CandidateProbe] {label}: {err}, giving up");
                    failure.record(label, &err);
                    failure.aborted_by = Some(err);
                    return Err(failure);
                }
                Err(err) => {
                    debug!("[CandidateProbe] {label}: {err}, trying next");
                    failure.record(label, &err);
                }
            }
        }

        Err(failure)
    }
}
