//! Typed first-party caveat conditions.
//!
//! On the wire a first-party caveat is an opaque byte string. Conditions this
//! crate recognizes are parsed into a [`Predicate`] so that checks never have
//! to split strings by hand:
//!
//! | Predicate | Wire form |
//! |-----------|-----------|
//! | [`Predicate::Email`] | `email=me@nope.com` |
//! | [`Predicate::Permissions`] | `{"permissions":["read","write"]}` |
//! | [`Predicate::Field`] | `key=value` |
//! | [`Predicate::Raw`] | anything else |

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::PredicateError;

const EMAIL_KEY: &str = "email";

/// A decoded first-party caveat condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// The authenticated email address of the caller.
    Email(String),

    /// The permission request the token was minted for.
    Permissions(Vec<String>),

    /// Any other `key=value` condition.
    Field {
        /// The condition name.
        key: String,
        /// The condition value.
        value: String,
    },

    /// A condition with no recognized structure.
    Raw(String),
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PermissionSet<P> {
    permissions: P,
}

impl Predicate {
    /// Parses a caveat condition.
    ///
    /// Any UTF-8 condition decodes to some predicate; only non UTF-8 bytes
    /// are an error.
    pub fn decode(condition: &[u8]) -> Result<Self, PredicateError> {
        let text = std::str::from_utf8(condition).map_err(|_| PredicateError::NotUtf8)?;

        if text.starts_with('{')
            && let Ok(set) = serde_json::from_str::<PermissionSet<Vec<String>>>(text)
        {
            return Ok(Predicate::Permissions(set.permissions));
        }

        Ok(match text.split_once('=') {
            Some((EMAIL_KEY, value)) => Predicate::Email(value.to_string()),
            Some((key, value)) if is_field_key(key) => Predicate::Field {
                key: key.to_string(),
                value: value.to_string(),
            },
            _ => Predicate::Raw(text.to_string()),
        })
    }

    /// Produces the wire form of this predicate.
    pub fn encode(&self) -> Result<Vec<u8>, PredicateError> {
        Ok(match self {
            Predicate::Permissions(permissions) => serde_json::to_vec(&PermissionSet {
                permissions: permissions.as_slice(),
            })
            .map_err(|e| PredicateError::Encode(e.to_string()))?,
            _ => self.to_string().into_bytes(),
        })
    }

    /// The value if this is an [`Predicate::Email`].
    pub fn email(&self) -> Option<&str> {
        match self {
            Predicate::Email(email) => Some(email),
            _ => None,
        }
    }

    /// The granted permissions if this is a [`Predicate::Permissions`].
    pub fn permissions(&self) -> Option<&[String]> {
        match self {
            Predicate::Permissions(permissions) => Some(permissions),
            _ => None,
        }
    }
}

fn is_field_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::Email(email) => write!(f, "{EMAIL_KEY}={email}"),
            Predicate::Permissions(permissions) => {
                let json = serde_json::to_string(&PermissionSet {
                    permissions: permissions.as_slice(),
                })
                .map_err(|_| std::fmt::Error)?;
                f.write_str(&json)
            }
            Predicate::Field { key, value } => write!(f, "{key}={value}"),
            Predicate::Raw(raw) => f.write_str(raw),
        }
    }
}

impl From<&str> for Predicate {
    fn from(condition: &str) -> Self {
        Predicate::decode(condition.as_bytes()).unwrap_or_else(|_| Predicate::Raw(condition.into()))
    }
}
