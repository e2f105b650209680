use log::debug;
use serde_json::{Value, json};

use mapch_model::{Post, SpotId, decode_post_list};

use super::{ApiClient, ApiError, ApiResult};
use crate::infra::executor::RequestFailure;
use crate::infra::http::{HttpResponse, Method, RequestBody};
use crate::infra::probe::{CandidateRequest, Payload};

/// Routes known to list posts for a spot, most specific first. GET routes
/// take the id in the path or query; the POST routes take it as form `id`.
pub fn post_list_candidates(spot_id: SpotId) -> Vec<CandidateRequest> {
    let id = spot_id.get();
    let mut candidates = vec![
        CandidateRequest::get(format!("api/posts/by-spot/{id}")),
        CandidateRequest::get(format!("api/posts?spot_id={id}")),
        CandidateRequest::get(format!("api/spots/{id}")),
        CandidateRequest::get(format!("api/getPosts?id={id}")),
        CandidateRequest::get(format!("api/posts/get?id={id}")),
        CandidateRequest::get(format!("getPosts?id={id}")),
        CandidateRequest::get(format!("posts/get?id={id}")),
    ];
    candidates.extend(
        ["api/getPosts", "api/posts/get", "getPosts", "posts/get"]
            .into_iter()
            .map(CandidateRequest::form),
    );
    candidates
}

#[derive(Debug, Clone)]
pub struct PostsApi {
    client: ApiClient,
}

impl PostsApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Posts for a spot, from whichever route answers with a recognizable
    /// list. When every route answers but none with a list, the spot is
    /// treated as having no posts.
    ///
    /// A network failure on any route ends the walk and is returned; the
    /// remaining routes are not tried, just as for spot writes.
    pub async fn list_posts(&self, spot_id: SpotId) -> ApiResult<Vec<Post>> {
        let candidates = post_list_candidates(spot_id);
        let form = Payload::new().field("id", spot_id.get());

        let result = self
            .client
            .probe()
            .probe_decode(
                &candidates,
                |candidate| {
                    Ok(self
                        .client
                        .read_candidate(candidate, &form)?
                        .header("Cache-Control", "no-cache"))
                },
                |response| {
                    decode_post_list(&response.body).ok_or_else(|| {
                        RequestFailure::decode(
                            response,
                            "no post list in response",
                        )
                    })
                },
            )
            .await;

        match result {
            Ok(posts) => Ok(posts),
            Err(failure) if failure.is_transport() => {
                Err(ApiError::Probe(failure))
            }
            Err(failure) => {
                debug!(
                    "[PostsApi] no post list for spot {spot_id}: {}",
                    failure.summary()
                );
                Ok(Vec::new())
            }
        }
    }

    pub async fn submit_post(
        &self,
        spot_id: SpotId,
        author: Option<&str>,
        content: &str,
    ) -> ApiResult<HttpResponse> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ApiError::Validation("comment text is required".into()));
        }
        let author = author.map(str::trim).filter(|a| !a.is_empty());
        let body = json!({
            "spot_id": spot_id.get(),
            "author": author.map_or(Value::Null, Value::from),
            "content": content,
        });
        let request = self
            .client
            .write(Method::Post, "api/posts/store")?
            .body(RequestBody::Json(body));
        self.client.send(request).await
    }
}
