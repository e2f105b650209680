use serde::Serialize;

use mapch_model::AccountId;

use super::{ApiClient, ApiResult};
use crate::infra::executor::RequestFailure;
use crate::infra::http::{HttpRequest, HttpResponse, Method, RequestBody};

#[derive(Debug, Serialize)]
struct RegistrationPayload<'a> {
    uid: &'a str,
    email: &'a str,
}

/// Backend user registration, the second phase of sign-up.
#[derive(Debug, Clone)]
pub struct UsersApi {
    client: ApiClient,
}

impl UsersApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// `POST {registration_path}` with `{uid, email}`, write timeout and an
    /// optional bearer token.
    pub fn registration_request(
        &self,
        uid: &AccountId,
        email: &str,
        token: Option<&str>,
    ) -> ApiResult<HttpRequest> {
        let payload = RegistrationPayload {
            uid: uid.as_str(),
            email,
        };
        let body = serde_json::to_value(&payload).map_err(|e| {
            RequestFailure::InvalidRequest(format!("registration body: {e}"))
        })?;
        Ok(self
            .client
            .write(Method::Post, self.client.registration_path())?
            .bearer(token)
            .body(RequestBody::Json(body)))
    }

    /// A single registration attempt. Retry is the caller's decision.
    pub async fn register_once(
        &self,
        request: &HttpRequest,
    ) -> Result<HttpResponse, RequestFailure> {
        self.client.executor().execute_once(request).await
    }
}
