use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use mapch_model::{AccountId, Principal};

use crate::domains::auth::identity::{
    Credential, IdentityError, IdentityErrorCode, IdentityProvider,
    IdentityResult, ProviderEvent,
};

/// How often each provider operation was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityCalls {
    pub create: usize,
    pub sign_in: usize,
    pub password_reset: usize,
    pub delete: usize,
    pub reauthenticate: usize,
    pub reload: usize,
    pub id_token: usize,
    pub sign_out: usize,
}

#[derive(Debug, Default)]
struct IdentityState {
    current: Option<Principal>,
    token: Option<String>,
    next_uid: usize,
    create_error: Option<IdentityError>,
    sign_in_error: Option<IdentityError>,
    delete_failures: usize,
    reauthenticate_error: Option<IdentityError>,
    reload_error: Option<IdentityError>,
    token_error: Option<IdentityError>,
    sign_out_error: Option<IdentityError>,
    calls: IdentityCalls,
}

/// In-memory [`IdentityProvider`] with scriptable failures.
#[derive(Debug, Clone)]
pub struct StubIdentityProvider {
    inner: Arc<Mutex<IdentityState>>,
    events: broadcast::Sender<ProviderEvent>,
}

impl Default for StubIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StubIdentityProvider {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(Mutex::new(IdentityState::default())),
            events,
        }
    }

    pub fn with_account(self, principal: Principal) -> Self {
        self.inner.lock().current = Some(principal);
        self
    }

    pub fn with_token(self, token: &str) -> Self {
        self.inner.lock().token = Some(token.to_string());
        self
    }

    pub fn fail_create(self, code: IdentityErrorCode) -> Self {
        self.inner.lock().create_error = Some(stub_error(code));
        self
    }

    pub fn fail_sign_in(self, code: IdentityErrorCode) -> Self {
        self.inner.lock().sign_in_error = Some(stub_error(code));
        self
    }

    /// The next `times` deletes are refused.
    pub fn fail_deletes(self, times: usize) -> Self {
        self.inner.lock().delete_failures = times;
        self
    }

    pub fn fail_reauthenticate(self, code: IdentityErrorCode) -> Self {
        self.inner.lock().reauthenticate_error = Some(stub_error(code));
        self
    }

    pub fn fail_reload(&self, code: IdentityErrorCode) {
        self.inner.lock().reload_error = Some(stub_error(code));
    }

    pub fn fail_token(&self, code: IdentityErrorCode) {
        self.inner.lock().token_error = Some(stub_error(code));
    }

    pub fn fail_sign_out(&self, code: IdentityErrorCode) {
        self.inner.lock().sign_out_error = Some(stub_error(code));
    }

    pub fn set_current(&self, principal: Option<Principal>) {
        self.inner.lock().current = principal;
    }

    pub fn calls(&self) -> IdentityCalls {
        self.inner.lock().calls
    }

    /// Deliver `event` to every subscriber.
    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }
}

fn stub_error(code: IdentityErrorCode) -> IdentityError {
    IdentityError::new(code, format!("stub {code:?}"))
}

/// `Err` with the scripted error, if one is set.
fn scripted(error: &Option<IdentityError>) -> IdentityResult<()> {
    error.clone().map_or(Ok(()), Err)
}

#[async_trait]
impl IdentityProvider for StubIdentityProvider {
    async fn create_account(
        &self,
        email: &str,
        _password: &str,
    ) -> IdentityResult<Principal> {
        let mut state = self.inner.lock();
        state.calls.create += 1;
        scripted(&state.create_error)?;
        state.next_uid += 1;
        let principal = Principal::new(
            AccountId::new(format!("stub-uid-{}", state.next_uid)),
            Some(email.to_string()),
        );
        state.current = Some(principal.clone());
        Ok(principal)
    }

    async fn sign_in(
        &self,
        email: &str,
        _password: &str,
    ) -> IdentityResult<Principal> {
        let mut state = self.inner.lock();
        state.calls.sign_in += 1;
        scripted(&state.sign_in_error)?;
        let principal = Principal::new(
            AccountId::new(format!("stub-{email}")),
            Some(email.to_string()),
        );
        state.current = Some(principal.clone());
        Ok(principal)
    }

    async fn send_password_reset(&self, _email: &str) -> IdentityResult<()> {
        self.inner.lock().calls.password_reset += 1;
        Ok(())
    }

    async fn delete_account(&self, id: &AccountId) -> IdentityResult<()> {
        let mut state = self.inner.lock();
        state.calls.delete += 1;
        if state.delete_failures > 0 {
            state.delete_failures -= 1;
            return Err(stub_error(IdentityErrorCode::RequiresRecentLogin));
        }
        if state.current.as_ref().is_some_and(|p| &p.id == id) {
            state.current = None;
        }
        Ok(())
    }

    async fn reauthenticate(
        &self,
        _id: &AccountId,
        _credential: &Credential,
    ) -> IdentityResult<()> {
        let mut state = self.inner.lock();
        state.calls.reauthenticate += 1;
        scripted(&state.reauthenticate_error)
    }

    async fn reload_account(
        &self,
        _id: &AccountId,
    ) -> IdentityResult<Principal> {
        let mut state = self.inner.lock();
        state.calls.reload += 1;
        scripted(&state.reload_error)?;
        state
            .current
            .clone()
            .ok_or_else(|| stub_error(IdentityErrorCode::UserNotFound))
    }

    async fn id_token(
        &self,
        _id: &AccountId,
        _force_refresh: bool,
    ) -> IdentityResult<Option<String>> {
        let mut state = self.inner.lock();
        state.calls.id_token += 1;
        scripted(&state.token_error)?;
        Ok(state.token.clone())
    }

    fn current_account(&self) -> Option<Principal> {
        self.inner.lock().current.clone()
    }

    fn sign_out(&self) -> IdentityResult<()> {
        let mut state = self.inner.lock();
        state.calls.sign_out += 1;
        scripted(&state.sign_out_error)?;
        state.current = None;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
