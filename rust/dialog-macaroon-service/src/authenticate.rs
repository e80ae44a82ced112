//! Identity checks performed by the discharger.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

use async_trait::async_trait;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// An email and password pair presented to the discharger.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// The claimed email.
    pub email: String,
    /// The password.
    pub password: String,
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"..")
            .finish()
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// The verified email.
    pub email: String,
}

/// Failure to authenticate a caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    /// Unknown email or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The identity provider could not be reached.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Checks credentials against an identity provider.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait Authenticator {
    /// Returns the identity behind `credentials`.
    async fn authenticate(&self, credentials: &Credentials)
    -> Result<Identity, AuthenticationError>;
}

/// An in-memory [`Authenticator`] over a fixed set of users.
#[derive(Clone, Default)]
pub struct StaticAuthenticator {
    users: HashMap<String, String>,
}

impl StaticAuthenticator {
    /// An authenticator that knows no users.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user.
    pub fn with_user(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(email.into(), password.into());
        self
    }
}

impl Debug for StaticAuthenticator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticAuthenticator")
            .field("users", &self.users.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<Identity, AuthenticationError> {
        let password = self
            .users
            .get(&credentials.email)
            .ok_or(AuthenticationError::InvalidCredentials)?;

        if bool::from(password.as_bytes().ct_eq(credentials.password.as_bytes())) {
            Ok(Identity {
                email: credentials.email.clone(),
            })
        } else {
            Err(AuthenticationError::InvalidCredentials)
        }
    }
}
