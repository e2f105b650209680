//! State behind the spot detail sheet: photos, reviews and the lead
//! comment, kept current from the cache, the backend and spot events.

use std::collections::HashSet;

use chrono::Utc;
use log::debug;
use url::Url;

use mapch_model::{ANONYMOUS_AUTHOR, Review, Spot, SpotId};

use crate::infra::api::{ApiResult, PostsApi, resolve_image_url};
use crate::infra::cache::PhotoCache;
use crate::infra::events::SpotEvent;

/// Trim every path, drop blanks and keep the first occurrence of each.
pub fn cleaned_unique<I, S>(paths: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .filter_map(|path| {
            let trimmed = path.as_ref().trim();
            (!trimmed.is_empty() && seen.insert(trimmed.to_string()))
                .then(|| trimmed.to_string())
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpotDetail {
    pub spot_id: SpotId,
    pub name: String,
    pub rating: u8,
    pub photo_paths: Vec<String>,
    pub reviews: Vec<Review>,
    pub lead_comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SpotDetailService {
    posts: PostsApi,
    cache: PhotoCache,
    image_base: Url,
}

impl SpotDetailService {
    pub fn new(posts: PostsApi, cache: PhotoCache, image_base: Url) -> Self {
        Self {
            posts,
            cache,
            image_base,
        }
    }

    /// Initial detail for `spot`. Cached photo paths win over the list that
    /// came with the spot; the server's paths are then merged in behind
    /// them.
    pub async fn open(&self, spot: &Spot) -> SpotDetail {
        let server = spot.photo_paths();
        let cached = self.cache.load(spot.id).await;
        let initial = if cached.is_empty() {
            server.clone()
        } else {
            cached
        };

        SpotDetail {
            spot_id: spot.id,
            name: spot.name.clone(),
            rating: spot.rating(),
            photo_paths: cleaned_unique(initial.iter().chain(server.iter())),
            reviews: Vec::new(),
            lead_comment: spot.lead_comment(),
        }
    }

    /// Replace the review list from the backend. Posts without text are
    /// skipped.
    pub async fn load_reviews(&self, detail: &mut SpotDetail) -> ApiResult<()> {
        let posts = self.posts.list_posts(detail.spot_id).await?;
        detail.reviews = posts.iter().filter_map(|p| p.to_review()).collect();
        if detail.lead_comment.is_none() {
            detail.lead_comment =
                detail.reviews.first().map(|r| r.text.clone());
        }
        debug!(
            "[SpotDetail] spot {} has {} reviews",
            detail.spot_id,
            detail.reviews.len()
        );
        Ok(())
    }

    /// Post a comment and show it at the top right away.
    pub async fn submit_comment(
        &self,
        detail: &mut SpotDetail,
        author: Option<&str>,
        text: &str,
    ) -> ApiResult<Review> {
        self.posts.submit_post(detail.spot_id, author, text).await?;

        let author = author
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(ANONYMOUS_AUTHOR);
        let review = Review {
            author: author.to_string(),
            rating: 0,
            text: text.trim().to_string(),
            timestamp: Some(Utc::now()),
        };
        detail.reviews.insert(0, review.clone());
        if detail.lead_comment.as_deref().is_none_or(str::is_empty) {
            detail.lead_comment = Some(review.text.clone());
        }
        Ok(review)
    }

    /// Adopt an edited photo list and remember it for the next open.
    pub async fn apply_photo_update(
        &self,
        detail: &mut SpotDetail,
        paths: &[String],
    ) {
        detail.photo_paths = cleaned_unique(paths);
        self.cache.store(detail.spot_id, &detail.photo_paths).await;
    }

    pub fn photo_urls(&self, detail: &SpotDetail) -> Vec<Url> {
        detail
            .photo_paths
            .iter()
            .filter_map(|path| resolve_image_url(&self.image_base, path))
            .collect()
    }

    pub fn header_photo_url(&self, detail: &SpotDetail) -> Option<Url> {
        detail
            .photo_paths
            .iter()
            .find_map(|path| resolve_image_url(&self.image_base, path))
    }

    /// Fold a spot event into `detail`. Returns whether anything changed.
    pub async fn on_spot_event(
        &self,
        detail: &mut SpotDetail,
        event: &SpotEvent,
    ) -> bool {
        match event {
            SpotEvent::PhotosUpdated { id, paths } if *id == detail.spot_id => {
                self.apply_photo_update(detail, paths).await;
                true
            }
            SpotEvent::Updated {
                id,
                name,
                evaluation,
            } if *id == detail.spot_id => {
                if let Some(name) = name {
                    detail.name = name.clone();
                }
                if let Some(evaluation) = evaluation {
                    detail.rating = (*evaluation).min(5);
                }
                true
            }
            _ => false,
        }
    }
}
