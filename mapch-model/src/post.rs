use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flexible::{FlexibleScalar, first_non_empty, parse_timestamp};

/// Display name used when a post carries no author at all.
pub const ANONYMOUS_AUTHOR: &str = "匿名";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserRef {
    pub name: Option<String>,
    pub username: Option<String>,
    pub nickname: Option<String>,
}

/// A comment/review posted on a spot.
///
/// The backend has shipped several spellings for most fields, so decoding
/// goes through [`RawPost`] and picks the first non-empty candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPost")]
pub struct Post {
    pub id: Option<i64>,
    pub spot_id: Option<i64>,
    pub author: Option<String>,
    pub content: Option<String>,
    pub rating: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub user: Option<UserRef>,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    id: Option<FlexibleScalar>,
    spot_id: Option<FlexibleScalar>,
    author: Option<String>,
    user_name: Option<String>,
    content: Option<String>,
    comment: Option<String>,
    text: Option<String>,
    body: Option<String>,
    message: Option<String>,
    rating: Option<FlexibleScalar>,
    evaluation: Option<FlexibleScalar>,
    stars: Option<FlexibleScalar>,
    created_at: Option<String>,
    #[serde(rename = "createdAt")]
    created_at_camel: Option<String>,
    updated_at: Option<String>,
    date: Option<String>,
    time: Option<String>,
    user: Option<UserRef>,
}

impl From<RawPost> for Post {
    fn from(raw: RawPost) -> Self {
        let rating = [&raw.rating, &raw.evaluation, &raw.stars]
            .into_iter()
            .flatten()
            .find_map(FlexibleScalar::as_i64);
        let created_at = first_non_empty([
            &raw.created_at,
            &raw.created_at_camel,
            &raw.updated_at,
            &raw.date,
            &raw.time,
        ])
        .and_then(|s| parse_timestamp(&s));

        Post {
            id: raw.id.as_ref().and_then(FlexibleScalar::as_i64),
            spot_id: raw.spot_id.as_ref().and_then(FlexibleScalar::as_i64),
            author: first_non_empty([&raw.author, &raw.user_name]),
            content: first_non_empty([
                &raw.content,
                &raw.comment,
                &raw.text,
                &raw.body,
                &raw.message,
            ]),
            rating,
            created_at,
            user: raw.user,
        }
    }
}

impl Post {
    pub fn author_resolved(&self) -> String {
        let user = self.user.clone().unwrap_or_default();
        first_non_empty([
            &self.author,
            &user.name,
            &user.username,
            &user.nickname,
        ])
        .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string())
    }

    pub fn rating_resolved(&self) -> u8 {
        self.rating.unwrap_or(0).clamp(0, 5) as u8
    }

    /// Posts without any text are not shown.
    pub fn to_review(&self) -> Option<Review> {
        let text = first_non_empty([&self.content])?;
        Some(Review {
            author: self.author_resolved(),
            rating: self.rating_resolved(),
            text,
            timestamp: self.created_at,
        })
    }
}

/// Display-ready review card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub author: String,
    pub rating: u8,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Decode a post list from any of the envelope shapes the backend uses:
/// a bare array, `{posts}`, `{data}`, `{items}` or `{spot: {posts}}`.
///
/// Returns `None` when the body matches none of them.
pub fn decode_post_list(body: &[u8]) -> Option<Vec<Post>> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let list = match &value {
        serde_json::Value::Array(_) => Some(&value),
        serde_json::Value::Object(map) => ["posts", "data", "items"]
            .iter()
            .find_map(|key| map.get(*key).filter(|v| v.is_array()))
            .or_else(|| {
                map.get("spot")
                    .and_then(|spot| spot.get("posts"))
                    .filter(|v| v.is_array())
            }),
        _ => None,
    }?;
    serde_json::from_value(list.clone()).ok()
}
