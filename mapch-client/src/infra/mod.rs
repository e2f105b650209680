pub mod api;
pub mod cache;
pub mod events;
pub mod executor;
pub mod http;
pub mod probe;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
