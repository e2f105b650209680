//! Session status and the guard that keeps it in line with the provider.

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use mapch_model::Principal;

use super::identity::{IdentityError, IdentityProvider, ProviderEvent};
use crate::infra::api::ApiClient;
use crate::infra::events::LifecycleEvent;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionStatus {
    Authenticated(Principal),
    #[default]
    Unauthenticated,
}

impl SessionStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated(_))
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            SessionStatus::Authenticated(principal) => Some(principal),
            SessionStatus::Unauthenticated => None,
        }
    }
}

impl From<Option<Principal>> for SessionStatus {
    fn from(account: Option<Principal>) -> Self {
        account.map_or(
            SessionStatus::Unauthenticated,
            SessionStatus::Authenticated,
        )
    }
}

/// Session status behind a watch channel: cheap reads, change
/// notification for any number of observers.
#[derive(Clone, Debug)]
pub struct SessionStore {
    sender: Arc<watch::Sender<SessionStatus>>,
    receiver: watch::Receiver<SessionStatus>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(SessionStatus::Unauthenticated);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn current(&self) -> SessionStatus {
        self.receiver.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.receiver.borrow().is_authenticated()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.receiver.clone()
    }

    pub fn set(&self, status: SessionStatus) {
        // Only notify on an actual change.
        self.sender.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    pub fn authenticate(&self, principal: Principal) {
        self.set(SessionStatus::Authenticated(principal));
    }

    pub fn invalidate(&self) {
        self.set(SessionStatus::Unauthenticated);
    }
}

/// Reacts to provider and app lifecycle events; the only component that
/// forces a sign-out on its own.
#[derive(Clone)]
pub struct SessionGuard {
    provider: Arc<dyn IdentityProvider>,
    store: SessionStore,
    api: Option<ApiClient>,
}

impl fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard")
            .field("status", &self.store.current())
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}

impl SessionGuard {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: SessionStore,
    ) -> Self {
        Self {
            provider,
            store,
            api: None,
        }
    }

    /// Keep the client's bearer token in step with refreshed id tokens.
    pub fn with_api(mut self, api: ApiClient) -> Self {
        self.api = Some(api);
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub async fn handle_provider_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::TokenChanged => self.refresh_token().await,
            ProviderEvent::AuthStateChanged => {
                let account = self.provider.current_account();
                debug!(
                    "[SessionGuard] auth state changed, signed in: {}",
                    account.is_some()
                );
                if account.is_none() {
                    self.clear_token().await;
                }
                self.store.set(account.into());
            }
        }
    }

    pub async fn handle_lifecycle_event(&self, event: LifecycleEvent) {
        if event == LifecycleEvent::Foreground {
            self.revalidate().await;
        }
    }

    /// Reload the current account from the provider and reconcile.
    pub async fn revalidate(&self) {
        let Some(account) = self.provider.current_account() else {
            self.store.invalidate();
            return;
        };
        match self.provider.reload_account(&account.id).await {
            Ok(_) => self.store.set(self.provider.current_account().into()),
            Err(err) if err.is_terminal() => self.force_sign_out(&err).await,
            Err(err) => {
                debug!("[SessionGuard] reload failed, keeping session: {err}");
            }
        }
    }

    async fn refresh_token(&self) {
        let Some(account) = self.provider.current_account() else {
            return;
        };
        match self.provider.id_token(&account.id, true).await {
            Ok(token) => {
                if let Some(api) = &self.api {
                    api.set_token(token).await;
                }
            }
            Err(err) if err.is_terminal() => self.force_sign_out(&err).await,
            Err(err) => {
                debug!("[SessionGuard] token refresh failed: {err}");
            }
        }
    }

    /// Mark the session unauthenticated even if the provider sign-out
    /// itself fails.
    pub async fn force_sign_out(&self, cause: &IdentityError) {
        info!("[SessionGuard] forcing sign-out: {cause}");
        if let Err(err) = self.provider.sign_out() {
            warn!("[SessionGuard] provider sign-out failed: {err}");
        }
        self.clear_token().await;
        self.store.invalidate();
    }

    async fn clear_token(&self) {
        if let Some(api) = &self.api {
            api.set_token(None).await;
        }
    }

    /// Revalidate once, then follow provider and lifecycle events until both
    /// streams close.
    pub fn spawn(
        self,
        lifecycle: broadcast::Receiver<LifecycleEvent>,
    ) -> JoinHandle<()> {
        let provider_events = self.provider.subscribe();
        tokio::spawn(self.run(provider_events, lifecycle))
    }

    async fn run(
        self,
        mut provider_events: broadcast::Receiver<ProviderEvent>,
        mut lifecycle: broadcast::Receiver<LifecycleEvent>,
    ) {
        self.revalidate().await;
        let mut provider_open = true;
        let mut lifecycle_open = true;

        while provider_open || lifecycle_open {
            tokio::select! {
                event = provider_events.recv(), if provider_open => {
                    match event {
                        Ok(event) => self.handle_provider_event(event).await,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("[SessionGuard] missed {n} provider events");
                            self.revalidate().await;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            provider_open = false;
                        }
                    }
                }
                event = lifecycle.recv(), if lifecycle_open => {
                    match event {
                        Ok(event) => self.handle_lifecycle_event(event).await,
                        Err(broadcast::error::RecvError::Lagged(_)) => {
                            self.revalidate().await;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            lifecycle_open = false;
                        }
                    }
                }
            }
        }
        debug!("[SessionGuard] event streams closed");
    }
}
