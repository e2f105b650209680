//! Community board ("keiziban") listing types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BoardSort {
    #[default]
    Latest,
    Trending,
    Favorite,
}

impl BoardSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoardSort::Latest => "latest",
            BoardSort::Trending => "trending",
            BoardSort::Favorite => "favorite",
        }
    }

    /// Favorites are per-user and need a bearer token.
    pub fn requires_auth(&self) -> bool {
        matches!(self, BoardSort::Favorite)
    }
}

impl fmt::Display for BoardSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BoardSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(BoardSort::Latest),
            "trending" => Ok(BoardSort::Trending),
            "favorite" => Ok(BoardSort::Favorite),
            other => Err(format!("unknown board sort '{other}'")),
        }
    }
}

/// Explicit pagination position. Each fetch takes a cursor and hands back
/// the cursor for the following page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageCursor {
    pub page: u32,
    pub per_page: u32,
}

impl PageCursor {
    pub const DEFAULT_PER_PAGE: u32 = 20;

    pub fn first(per_page: u32) -> Self {
        Self {
            page: 1,
            per_page: per_page.max(1),
        }
    }

    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            per_page: self.per_page,
        }
    }

    pub fn is_first(&self) -> bool {
        self.page <= 1
    }
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::first(Self::DEFAULT_PER_PAGE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedResponse<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> PagedResponse<T> {
    /// Whether pages beyond `meta.page` can still hold rows.
    pub fn has_more(&self) -> bool {
        u64::from(self.meta.page) * u64::from(self.meta.per_page)
            < self.meta.total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardAuthor {
    pub id: Option<i64>,
    pub uid: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardCategory {
    pub id: i64,
    pub name: String,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardLocation {
    pub name: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardDto {
    pub id: i64,
    pub description: String,
    pub location: BoardLocation,
    pub favorite_count: u64,
    pub view_count: u64,
    pub author: BoardAuthor,
    pub category: BoardCategory,
    pub created_at: Option<String>,
    pub is_favorited: bool,
    pub photo_url: Option<String>,
}

/// List row derived from a [`BoardDto`].
#[derive(Debug, Clone, PartialEq)]
pub struct BoardRow {
    pub id: i64,
    pub content: String,
    pub location_name: String,
    pub likes: u64,
    pub views: u64,
    pub author_name: String,
    pub author_initial: String,
    pub category_name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub is_favorited: bool,
    pub photo_url: Option<String>,
}

impl From<&BoardDto> for BoardRow {
    fn from(dto: &BoardDto) -> Self {
        let created_at = dto.created_at.as_deref().and_then(|raw| {
            crate::flexible::parse_timestamp(raw).or_else(|| {
                crate::flexible::parse_timestamp(&format!("{raw}Z"))
            })
        });
        BoardRow {
            id: dto.id,
            content: dto.description.clone(),
            location_name: dto.location.name.clone().unwrap_or_default(),
            likes: dto.favorite_count,
            views: dto.view_count,
            author_name: dto.author.name.clone(),
            author_initial: dto
                .author
                .name
                .chars()
                .next()
                .map(String::from)
                .unwrap_or_default(),
            category_name: dto.category.name.clone(),
            created_at,
            is_favorited: dto.is_favorited,
            photo_url: dto.photo_url.clone(),
        }
    }
}
