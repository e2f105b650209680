//! Data model definitions shared across the map channel crates: viewport
//! geometry, spots, posts, board listings and identities.

pub mod board;
pub mod error;
pub mod flexible;
pub mod geo;
pub mod identity;
pub mod post;
pub mod spot;

pub use board::{
    BoardAuthor, BoardCategory, BoardDto, BoardLocation, BoardRow, BoardSort,
    PageCursor, PageMeta, PagedResponse,
};
pub use error::{ModelError, Result as ModelResult};
pub use geo::{BoundingBox, NEAR_IDENTICAL_EPSILON, ViewportSnapshot};
pub use identity::{AccountId, Principal};
pub use post::{ANONYMOUS_AUTHOR, Post, Review, UserRef, decode_post_list};
pub use spot::{CommentNode, Photo, Spot, SpotId};
