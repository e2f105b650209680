use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier assigned by the identity provider (a Firebase-style `uid`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The signed-in user as far as the client is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: AccountId,
    pub email: Option<String>,
}

impl Principal {
    pub fn new(id: AccountId, email: Option<String>) -> Self {
        Self { id, email }
    }
}
