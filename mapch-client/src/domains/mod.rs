pub mod auth;
pub mod boards;
pub mod map;
pub mod spots;
