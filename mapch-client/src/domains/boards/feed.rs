//! Paged board listing with filter resets and infinite scroll.

use log::{debug, warn};

use mapch_model::{BoardRow, BoardSort, PageCursor};

use crate::infra::api::{ApiResult, BoardQuery, BoardsApi};

/// Rows from the end at which the next page is requested.
pub const LOAD_MORE_THRESHOLD: usize = 5;

#[derive(Debug, Clone)]
pub struct BoardFeed {
    api: BoardsApi,
    per_page: u32,
    query: BoardQuery,
    /// `None` once the last page has been seen.
    next: Option<PageCursor>,
    rows: Vec<BoardRow>,
    loading: bool,
    alert: Option<String>,
}

impl BoardFeed {
    pub fn new(api: BoardsApi, per_page: u32) -> Self {
        Self {
            api,
            per_page,
            query: BoardQuery::default(),
            next: Some(PageCursor::first(per_page)),
            rows: Vec::new(),
            loading: false,
            alert: None,
        }
    }

    pub fn rows(&self) -> &[BoardRow] {
        &self.rows
    }

    pub fn query(&self) -> BoardQuery {
        self.query
    }

    /// Spinner for full reloads; appending pages does not set it.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }

    /// Switch sort or category and start again from the first page.
    pub async fn set_filter(
        &mut self,
        sort: BoardSort,
        category_id: Option<i64>,
    ) -> ApiResult<()> {
        self.query = BoardQuery { sort, category_id };
        self.reload().await
    }

    pub async fn reload(&mut self) -> ApiResult<()> {
        self.loading = true;
        let result = self.fetch(PageCursor::first(self.per_page), true).await;
        self.loading = false;
        result
    }

    pub async fn load_more(&mut self) -> ApiResult<()> {
        match self.next {
            Some(cursor) => self.fetch(cursor, false).await,
            None => Ok(()),
        }
    }

    pub fn should_load_more(&self, index: usize) -> bool {
        self.has_more()
            && index >= self.rows.len().saturating_sub(LOAD_MORE_THRESHOLD)
    }

    /// Called as rows scroll into view; fetches the next page near the end.
    /// Returns whether a page was requested.
    pub async fn on_item_visible(&mut self, board_id: i64) -> ApiResult<bool> {
        let Some(index) = self.rows.iter().position(|row| row.id == board_id)
        else {
            return Ok(false);
        };
        if !self.should_load_more(index) {
            return Ok(false);
        }
        self.load_more().await.map(|()| true)
    }

    async fn fetch(
        &mut self,
        cursor: PageCursor,
        reset: bool,
    ) -> ApiResult<()> {
        match self.api.fetch_boards(self.query, cursor).await {
            Ok(page) => {
                let rows = page.response.data.iter().map(BoardRow::from);
                if reset {
                    self.rows = rows.collect();
                } else {
                    self.rows.extend(rows);
                }
                self.next = page.next;
                debug!(
                    "[BoardFeed] {} rows after page {}, more: {}",
                    self.rows.len(),
                    cursor.page,
                    self.next.is_some()
                );
                Ok(())
            }
            Err(err) => {
                warn!("[BoardFeed] page {} failed: {err}", cursor.page);
                self.alert = Some(err.to_string());
                Err(err)
            }
        }
    }
}
