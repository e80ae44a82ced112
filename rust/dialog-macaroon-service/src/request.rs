use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};

use crate::Credentials;

/// Asks the issuer for a root macaroon scoped to a set of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequest {
    /// The requested permissions.
    pub permissions: Vec<String>,
}

impl PermissionRequest {
    /// A request for `permissions`.
    pub fn new<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }
}

/// Asks the discharger to prove a third-party caveat.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DischargeRequest {
    /// The caller's email.
    pub email: String,
    /// The caller's password.
    pub password: String,
    /// The third-party caveat id, as found in the root macaroon.
    #[serde(rename = "caveatId")]
    pub caveat_id: String,
}

impl DischargeRequest {
    /// The credentials to authenticate.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }
}

impl Debug for DischargeRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DischargeRequest")
            .field("email", &self.email)
            .field("password", &"..")
            .field("caveat_id", &self.caveat_id)
            .finish()
    }
}
