//! Auth facade used by the UI layer: sign-in, sign-up, password reset and
//! sign-out, with a loading flag and the last user-facing error.

use std::fmt;
use std::sync::Arc;

use log::{debug, info};
use tokio::sync::watch;

use mapch_model::Principal;

use super::errors::{AuthError, AuthResult, ValidationError};
use super::identity::{Credential, IdentityProvider};
use super::provisioning::{ProvisioningWorkflow, StateObserver};
use super::session::SessionStore;
use crate::infra::api::{ApiClient, UsersApi};

/// What a form needs to render: spinner and error banner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthActivity {
    pub loading: bool,
    pub error_message: Option<String>,
}

/// Clears the loading flag when an operation ends, on every path.
struct LoadingGuard<'a> {
    activity: &'a watch::Sender<AuthActivity>,
}

impl<'a> LoadingGuard<'a> {
    fn begin(activity: &'a watch::Sender<AuthActivity>) -> Self {
        activity.send_modify(|state| {
            state.loading = true;
            state.error_message = None;
        });
        Self { activity }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.activity.send_modify(|state| state.loading = false);
    }
}

#[derive(Clone)]
pub struct AuthManager {
    provider: Arc<dyn IdentityProvider>,
    api: ApiClient,
    store: SessionStore,
    activity: Arc<watch::Sender<AuthActivity>>,
    observer: Option<StateObserver>,
}

impl fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthManager")
            .field("session", &self.store.current())
            .field("activity", &*self.activity.borrow())
            .finish_non_exhaustive()
    }
}

impl AuthManager {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        api: ApiClient,
        store: SessionStore,
    ) -> Self {
        let (activity, _) = watch::channel(AuthActivity::default());
        Self {
            provider,
            api,
            store,
            activity: Arc::new(activity),
            observer: None,
        }
    }

    /// Forward sign-up progress to `observer`.
    pub fn with_provisioning_observer(
        mut self,
        observer: StateObserver,
    ) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn session(&self) -> &SessionStore {
        &self.store
    }

    pub fn activity(&self) -> watch::Receiver<AuthActivity> {
        self.activity.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.activity.borrow().loading
    }

    pub fn error_message(&self) -> Option<String> {
        self.activity.borrow().error_message.clone()
    }

    fn record<T>(&self, result: AuthResult<T>) -> AuthResult<T> {
        if let Err(err) = &result {
            let message = err.user_message();
            debug!("[AuthManager] {err}");
            self.activity
                .send_modify(|state| state.error_message = Some(message));
        }
        result
    }

    fn require_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<Credential> {
        if email.is_empty() || password.is_empty() {
            return self.record(Err(ValidationError::MissingCredentials.into()));
        }
        Ok(Credential::new(email, password))
    }

    async fn establish(&self, principal: &Principal) {
        let token = self
            .provider
            .id_token(&principal.id, false)
            .await
            .unwrap_or_else(|err| {
                debug!("[AuthManager] no id token after sign-in: {err}");
                None
            });
        self.api.set_token(token).await;
        self.store.authenticate(principal.clone());
    }

    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<Principal> {
        let credential = self.require_credentials(email, password)?;
        let _loading = LoadingGuard::begin(&self.activity);

        let result = self
            .provider
            .sign_in(&credential.email, &credential.password)
            .await
            .map_err(AuthError::from);
        if let Ok(principal) = &result {
            info!("[AuthManager] signed in as {}", principal.id);
            self.establish(principal).await;
        }
        self.record(result)
    }

    /// Create the account with the provider and register it with the
    /// backend. Succeeds only when both phases do.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<Principal> {
        let credential = self.require_credentials(email, password)?;
        let _loading = LoadingGuard::begin(&self.activity);

        let mut workflow = ProvisioningWorkflow::new(
            Arc::clone(&self.provider),
            UsersApi::new(self.api.clone()),
        );
        if let Some(observer) = &self.observer {
            workflow = workflow.with_observer(Arc::clone(observer));
        }

        let result = workflow.run(&credential).await.map_err(AuthError::from);
        if let Ok(principal) = &result {
            self.establish(principal).await;
        }
        self.record(result)
    }

    pub async fn reset_password(&self, email: &str) -> AuthResult<()> {
        if email.is_empty() {
            return self.record(Err(ValidationError::MissingEmail.into()));
        }
        let _loading = LoadingGuard::begin(&self.activity);
        let result = self
            .provider
            .send_password_reset(email)
            .await
            .map_err(AuthError::from);
        self.record(result)
    }

    pub async fn sign_out(&self) -> AuthResult<()> {
        let result = self.provider.sign_out().map_err(AuthError::SignOut);
        if result.is_ok() {
            self.api.set_token(None).await;
            self.store.invalidate();
        }
        self.record(result)
    }
}
