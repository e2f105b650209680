pub mod detail;

pub use detail::{SpotDetail, SpotDetailService, cleaned_unique};
