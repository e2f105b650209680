//! Authentication error types surfaced to callers of the auth facade.

use thiserror::Error;

use super::identity::IdentityError;
use super::provisioning::ProvisioningError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Input rejected before any provider or network call.
    #[error("{0}")]
    Validation(ValidationError),

    #[error("identity provider error: {0}")]
    Identity(#[from] IdentityError),

    #[error("sign-up failed: {0}")]
    Provisioning(#[from] ProvisioningError),

    #[error("sign-out failed: {0}")]
    SignOut(IdentityError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("email and password are required")]
    MissingCredentials,

    #[error("email is required")]
    MissingEmail,
}

impl ValidationError {
    pub fn localized_message(&self) -> &'static str {
        match self {
            ValidationError::MissingCredentials => {
                "メールアドレスとパスワードを入力してください"
            }
            ValidationError::MissingEmail => "メールアドレスを入力してください",
        }
    }
}

impl From<ValidationError> for AuthError {
    fn from(err: ValidationError) -> Self {
        AuthError::Validation(err)
    }
}

impl AuthError {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Validation(err) => err.localized_message().to_string(),
            AuthError::Identity(err) => err.localized_message(),
            AuthError::Provisioning(err) => err.user_message(),
            AuthError::SignOut(_) => "ログアウトに失敗しました".to_string(),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
