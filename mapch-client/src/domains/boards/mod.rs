pub mod feed;

pub use feed::{BoardFeed, LOAD_MORE_THRESHOLD};
