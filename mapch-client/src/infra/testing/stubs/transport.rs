use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::infra::http::{
    HttpRequest, HttpResponse, HttpTransport, Method, TransportError,
};

type Reply = Result<HttpResponse, TransportError>;

#[derive(Debug)]
struct Route {
    method: Method,
    /// Path without leading slash; may carry a `?query` to match on.
    path: String,
    replies: VecDeque<Reply>,
    /// Repeated once the queue runs dry.
    last: Option<Reply>,
}

impl Route {
    fn matches(&self, request: &HttpRequest) -> bool {
        if request.method != self.method {
            return false;
        }
        let path = request.url.path().trim_start_matches('/');
        if self.path.contains('?') {
            let query = request.url.query().unwrap_or_default();
            self.path == format!("{path}?{query}")
        } else {
            self.path == path
        }
    }

    fn next_reply(&mut self) -> Option<Reply> {
        match self.replies.pop_front() {
            Some(reply) => {
                self.last = Some(reply.clone());
                Some(reply)
            }
            None => self.last.clone(),
        }
    }
}

#[derive(Debug)]
struct Script {
    routes: Vec<Route>,
    fallback: Reply,
    requests: Vec<HttpRequest>,
}

/// [`HttpTransport`] answering from per-route reply queues and recording
/// every request it sees. Unmatched requests get the fallback, 404 unless
/// changed.
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    inner: Arc<Mutex<Script>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Script {
                routes: Vec::new(),
                fallback: Ok(HttpResponse::new(404, "not found")),
                requests: Vec::new(),
            })),
        }
    }

    /// Queue `reply` for `method path`. Replies are used in order; the last
    /// one sticks.
    pub fn on(self, method: Method, path: &str, reply: Reply) -> Self {
        {
            let mut script = self.inner.lock();
            let path = path.trim_start_matches('/').to_string();
            match script
                .routes
                .iter_mut()
                .find(|r| r.method == method && r.path == path)
            {
                Some(route) => route.replies.push_back(reply),
                None => script.routes.push(Route {
                    method,
                    path,
                    replies: VecDeque::from([reply]),
                    last: None,
                }),
            }
        }
        self
    }

    pub fn respond(
        self,
        method: Method,
        path: &str,
        status: u16,
        body: &str,
    ) -> Self {
        self.on(method, path, Ok(HttpResponse::new(status, body)))
    }

    pub fn fail(self, method: Method, path: &str, err: TransportError) -> Self {
        self.on(method, path, Err(err))
    }

    pub fn otherwise(self, reply: Reply) -> Self {
        self.inner.lock().fallback = reply;
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.inner.lock().requests.clone()
    }

    /// `METHOD /path?query` for every request, in order.
    pub fn labels(&self) -> Vec<String> {
        self.inner.lock().requests.iter().map(|r| r.label()).collect()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        let path = format!("/{}", path.trim_start_matches('/'));
        self.inner
            .lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.url.path() == path)
            .count()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Reply {
        let mut script = self.inner.lock();
        script.requests.push(request.clone());
        let reply = script
            .routes
            .iter_mut()
            .find(|route| route.matches(&request))
            .and_then(Route::next_reply);
        reply.unwrap_or_else(|| script.fallback.clone())
    }
}
