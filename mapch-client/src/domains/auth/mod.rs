pub mod errors;
pub mod identity;
pub mod manager;
pub mod provisioning;
pub mod session;

pub use errors::{AuthError, AuthResult, ValidationError};
pub use identity::{
    Credential, IdentityError, IdentityErrorCode, IdentityProvider,
    IdentityResult, ProviderEvent,
};
pub use manager::{AuthActivity, AuthManager};
pub use provisioning::{
    CompensationFailure, FailureReason, ProvisioningError, ProvisioningState,
    ProvisioningWorkflow, StateObserver,
};
pub use session::{SessionGuard, SessionStatus, SessionStore};
