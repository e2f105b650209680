//! Identity provider capability.
//!
//! Account storage, password checks and token minting live in an external
//! provider; this module fixes the interface the client drives it through
//! and the error codes it reacts to.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use mapch_model::{AccountId, Principal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityErrorCode {
    EmailAlreadyInUse,
    InvalidEmail,
    WeakPassword,
    UserNotFound,
    WrongPassword,
    UserDisabled,
    InvalidUserToken,
    UserTokenExpired,
    RequiresRecentLogin,
    NetworkError,
    TooManyRequests,
    Other,
}

impl IdentityErrorCode {
    /// Codes after which the local session can no longer be trusted.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IdentityErrorCode::UserNotFound
                | IdentityErrorCode::UserDisabled
                | IdentityErrorCode::InvalidUserToken
                | IdentityErrorCode::UserTokenExpired
        )
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code:?}: {message}")]
pub struct IdentityError {
    pub code: IdentityErrorCode,
    pub message: String,
}

impl IdentityError {
    pub fn new(code: IdentityErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.code.is_terminal()
    }

    /// User-facing message. Codes without a dedicated text fall back to the
    /// provider's own message.
    pub fn localized_message(&self) -> String {
        let text = match self.code {
            IdentityErrorCode::EmailAlreadyInUse => {
                "このメールアドレスは既に使用されています"
            }
            IdentityErrorCode::InvalidEmail => {
                "メールアドレスの形式が正しくありません"
            }
            IdentityErrorCode::WeakPassword => {
                "パスワードは6文字以上で入力してください"
            }
            IdentityErrorCode::UserNotFound => "ユーザーが見つかりません",
            IdentityErrorCode::WrongPassword => "パスワードが間違っています",
            IdentityErrorCode::UserDisabled => {
                "このアカウントは無効化されています"
            }
            _ => return self.message.clone(),
        };
        text.to_string()
    }
}

pub type IdentityResult<T> = Result<T, IdentityError>;

/// Email/password pair. Debug output never shows the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub email: String,
    pub password: String,
}

impl Credential {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The provider minted a new id token for the current account.
    TokenChanged,
    /// An account signed in or out.
    AuthStateChanged,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> IdentityResult<Principal>;

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> IdentityResult<Principal>;

    async fn send_password_reset(&self, email: &str) -> IdentityResult<()>;

    async fn delete_account(&self, id: &AccountId) -> IdentityResult<()>;

    async fn reauthenticate(
        &self,
        id: &AccountId,
        credential: &Credential,
    ) -> IdentityResult<()>;

    /// Fetch the account's current state from the provider.
    async fn reload_account(&self, id: &AccountId) -> IdentityResult<Principal>;

    async fn id_token(
        &self,
        id: &AccountId,
        force_refresh: bool,
    ) -> IdentityResult<Option<String>>;

    fn current_account(&self) -> Option<Principal>;

    fn sign_out(&self) -> IdentityResult<()>;

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}
