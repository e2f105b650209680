use log::debug;

use mapch_model::{BoardDto, BoardSort, PageCursor, PagedResponse};

use super::{ApiClient, ApiError, ApiResult};
use crate::infra::http::Method;

/// Filter for a board listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoardQuery {
    pub sort: BoardSort,
    pub category_id: Option<i64>,
}

/// One fetched page plus the cursor for the page after it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardPage {
    pub response: PagedResponse<BoardDto>,
    pub next: Option<PageCursor>,
}

#[derive(Debug, Clone)]
pub struct BoardsApi {
    client: ApiClient,
}

impl BoardsApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// `GET boards?sort&category_id&page&per_page`. Favorites carry the
    /// stored bearer token.
    pub async fn fetch_boards(
        &self,
        query: BoardQuery,
        cursor: PageCursor,
    ) -> ApiResult<BoardPage> {
        let mut request = self
            .client
            .read(Method::Get, "boards")?
            .query_pair("sort", query.sort.as_str());
        if let Some(category) = query.category_id {
            request = request.query_pair("category_id", &category.to_string());
        }
        request = request
            .query_pair("page", &cursor.page.to_string())
            .query_pair("per_page", &cursor.per_page.to_string());
        if query.sort.requires_auth() {
            let token = self.client.token().await;
            request = request.bearer(token.as_deref());
        }

        let response = self.client.send(request).await?;
        let response: PagedResponse<BoardDto> =
            response.json().map_err(|e| ApiError::Decode {
                what: "board page",
                message: e.to_string(),
            })?;
        let next = response.has_more().then(|| cursor.next());
        debug!(
            "[BoardsApi] {} page {} -> {} rows (total {})",
            query.sort,
            cursor.page,
            response.data.len(),
            response.meta.total
        );
        Ok(BoardPage { response, next })
    }
}
