pub mod viewport;

pub use viewport::{
    FetchError, SyncPhase, ViewportHandle, ViewportSettings, ViewportState,
    ViewportSyncController,
};
