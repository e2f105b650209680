//! Two-phase sign-up: create the identity with the provider, register it
//! with the backend, delete the identity again when registration fails.

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;

use mapch_model::{AccountId, Principal};

use super::errors::ValidationError;
use super::identity::{Credential, IdentityError, IdentityProvider};
use crate::infra::api::{ApiError, UsersApi};
use crate::infra::executor::RequestFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Validation,
    IdentityCreation,
    Registration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningState {
    Idle,
    CreatingIdentity,
    /// Registration attempt number, 0 or 1.
    RegisteringBackend(u8),
    RollingBack,
    Committed,
    Failed(FailureReason),
}

impl ProvisioningState {
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            ProvisioningState::CreatingIdentity
                | ProvisioningState::RegisteringBackend(_)
                | ProvisioningState::RollingBack
        )
    }
}

/// Rollback could not delete the freshly created identity.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "identity {account} left orphaned: delete failed ({first}), \
     retry after reauthentication failed ({second})"
)]
pub struct CompensationFailure {
    pub account: AccountId,
    pub first: IdentityError,
    pub second: IdentityError,
}

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("{0}")]
    Validation(ValidationError),

    #[error("could not create identity: {0}")]
    IdentityCreation(#[source] IdentityError),

    #[error("backend registration failed: {failure}")]
    Registration {
        #[source]
        failure: ApiError,
        compensation: Option<CompensationFailure>,
    },
}

impl ProvisioningError {
    pub fn reason(&self) -> FailureReason {
        match self {
            ProvisioningError::Validation(_) => FailureReason::Validation,
            ProvisioningError::IdentityCreation(_) => {
                FailureReason::IdentityCreation
            }
            ProvisioningError::Registration { .. } => {
                FailureReason::Registration
            }
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ProvisioningError::Validation(err) => {
                err.localized_message().to_string()
            }
            ProvisioningError::IdentityCreation(err) => err.localized_message(),
            ProvisioningError::Registration { failure, .. } => {
                match failure {
                    ApiError::Request(RequestFailure::Status {
                        status,
                        body,
                    }) => format!("APIエラー: {status} {body}"),
                    other => {
                        format!("登録APIに失敗しました ({other})")
                    }
                }
            }
        }
    }
}

pub type StateObserver = Arc<dyn Fn(&ProvisioningState) + Send + Sync>;

pub struct ProvisioningWorkflow {
    provider: Arc<dyn IdentityProvider>,
    users: UsersApi,
    observer: Option<StateObserver>,
}

impl fmt::Debug for ProvisioningWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningWorkflow")
            .field("users", &self.users)
            .field("has_observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl ProvisioningWorkflow {
    pub fn new(provider: Arc<dyn IdentityProvider>, users: UsersApi) -> Self {
        Self {
            provider,
            users,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: StateObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    fn enter(&self, state: ProvisioningState) {
        debug!("[Provisioning] -> {state:?}");
        if let Some(observer) = &self.observer {
            observer(&state);
        }
    }

    /// Run one sign-up attempt. Success means both the identity and the
    /// backend user exist.
    pub async fn run(
        &self,
        credential: &Credential,
    ) -> Result<Principal, ProvisioningError> {
        if credential.email.is_empty() || credential.password.is_empty() {
            self.enter(ProvisioningState::Failed(FailureReason::Validation));
            return Err(ProvisioningError::Validation(
                ValidationError::MissingCredentials,
            ));
        }

        self.enter(ProvisioningState::CreatingIdentity);
        let principal = match self
            .provider
            .create_account(&credential.email, &credential.password)
            .await
        {
            Ok(principal) => principal,
            Err(err) => {
                self.enter(ProvisioningState::Failed(
                    FailureReason::IdentityCreation,
                ));
                return Err(ProvisioningError::IdentityCreation(err));
            }
        };

        // Registration works without a token; the backend decides.
        let token = match self.provider.id_token(&principal.id, false).await {
            Ok(token) => token,
            Err(err) => {
                debug!(
                    "[Provisioning] no id token for {}: {err}",
                    principal.id
                );
                None
            }
        };

        match self
            .register(&principal.id, &credential.email, token.as_deref())
            .await
        {
            Ok(()) => {
                info!("[Provisioning] account {} provisioned", principal.id);
                self.enter(ProvisioningState::Committed);
                Ok(principal)
            }
            Err(failure) => {
                warn!(
                    "[Provisioning] registration for {} failed: {failure}",
                    principal.id
                );
                self.enter(ProvisioningState::RollingBack);
                let compensation =
                    self.roll_back(&principal.id, credential).await.err();
                self.enter(ProvisioningState::Failed(
                    FailureReason::Registration,
                ));
                Err(ProvisioningError::Registration {
                    failure,
                    compensation,
                })
            }
        }
    }

    /// At most two registration calls; the second only after a transient
    /// first failure and the executor's backoff.
    async fn register(
        &self,
        uid: &AccountId,
        email: &str,
        token: Option<&str>,
    ) -> Result<(), ApiError> {
        let request = self.users.registration_request(uid, email, token)?;
        let mut attempt = 0u8;
        loop {
            self.enter(ProvisioningState::RegisteringBackend(attempt));
            match self.users.register_once(&request).await {
                Ok(_) => return Ok(()),
                Err(failure) if attempt == 0 && failure.is_transient() => {
                    let backoff =
                        self.users.client().executor().retry_backoff();
                    debug!(
                        "[Provisioning] registration failed transiently \
                         ({failure}), retrying in {backoff:?}"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(failure) => return Err(failure.into()),
            }
        }
    }

    /// Delete the new identity; if the provider refuses, reauthenticate with
    /// the sign-up credential and delete once more.
    async fn roll_back(
        &self,
        id: &AccountId,
        credential: &Credential,
    ) -> Result<(), CompensationFailure> {
        let first = match self.provider.delete_account(id).await {
            Ok(()) => {
                debug!("[Provisioning] rolled back identity {id}");
                return Ok(());
            }
            Err(err) => err,
        };

        debug!(
            "[Provisioning] delete of {id} refused ({first}), \
             reauthenticating"
        );
        if let Err(err) = self.provider.reauthenticate(id, credential).await {
            debug!("[Provisioning] reauthentication of {id} failed: {err}");
        }

        match self.provider.delete_account(id).await {
            Ok(()) => {
                debug!("[Provisioning] rolled back identity {id} on retry");
                Ok(())
            }
            Err(second) => {
                let failure = CompensationFailure {
                    account: id.clone(),
                    first,
                    second,
                };
                warn!("[Provisioning] {failure}");
                Err(failure)
            }
        }
    }
}
