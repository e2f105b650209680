//! Client-side resilience layer for the map channel backend.
//!
//! `infra` holds the transport seam, the retrying executor, endpoint
//! probing, the typed API surfaces, the event bus and the photo cache.
//! `domains` builds the app-facing pieces on top: viewport sync, sign-up
//! provisioning and session guarding, spot detail state and board paging.

pub mod domains;
pub mod infra;

pub use domains::auth::{
    AuthManager, ProvisioningWorkflow, SessionGuard, SessionStatus,
    SessionStore,
};
pub use domains::map::{ViewportHandle, ViewportSyncController};
pub use infra::api::{ApiClient, ApiError, ApiResult};
pub use infra::events::EventBus;
pub use infra::executor::{RequestExecutor, RequestFailure};
pub use infra::http::{HttpTransport, ReqwestTransport};
pub use infra::probe::{AggregatedFailure, CandidateProbe, CandidateRequest};
