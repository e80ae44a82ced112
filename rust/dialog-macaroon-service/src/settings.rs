//! Service configuration.
//!
//! Both services share two secrets provisioned out of band: the root secret
//! that signs root macaroons, and the discharge secret that the issuer and
//! the discharger use to exchange discharge keys. Everything else has a
//! default.
//!
//! Settings are read from the environment with [`Settings::from_env`] or from
//! JSON with [`Settings::from_json`]:
//!
//! ```json
//! {
//!   "root_secret": "some_shared_secret_1",
//!   "discharge_secret": "some_other_shared_secret_1",
//!   "discharger_location": "http://example.com"
//! }
//! ```

use std::fmt::{Debug, Formatter};

use serde::Deserialize;
use thiserror::Error;

/// Environment variable holding the root secret.
pub const ROOT_SECRET_VAR: &str = "MACAROON_ROOT_SECRET";
/// Environment variable holding the discharge secret.
pub const DISCHARGE_SECRET_VAR: &str = "MACAROON_DISCHARGE_SECRET";
/// Environment variable overriding [`Settings::identifier`].
pub const IDENTIFIER_VAR: &str = "MACAROON_IDENTIFIER";
/// Environment variable overriding [`Settings::location`].
pub const LOCATION_VAR: &str = "MACAROON_LOCATION";
/// Environment variable overriding [`Settings::discharger_location`].
pub const DISCHARGER_LOCATION_VAR: &str = "MACAROON_DISCHARGER_LOCATION";
/// Environment variable overriding [`Settings::discharge_location`].
pub const DISCHARGE_LOCATION_VAR: &str = "MACAROON_DISCHARGE_LOCATION";
/// Environment variable overriding [`Settings::condition`].
pub const CONDITION_VAR: &str = "MACAROON_CONDITION";

const DEFAULT_IDENTIFIER: &str = "some id";
const DEFAULT_LOCATION: &str = "a location";
const DEFAULT_DISCHARGER_LOCATION: &str = "http://example.com";
const DEFAULT_DISCHARGE_LOCATION: &str = "remote location";
const DEFAULT_CONDITION: &str = "is-authorized";

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A required setting was not provided.
    #[error("missing setting {0}")]
    Missing(&'static str),

    /// A setting was provided but is empty.
    #[error("setting {0} must not be empty")]
    Empty(&'static str),

    /// The JSON document could not be parsed.
    #[error("invalid settings document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Secret key material. Never printed.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub struct Secret(Vec<u8>);

impl Secret {
    /// Wraps secret bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The secret bytes.
    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// Settings for both services.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Secret used to mint and verify root macaroons.
    pub root_secret: Secret,
    /// Secret shared between issuer and discharger.
    pub discharge_secret: Secret,
    /// Identifier of issued root macaroons.
    #[serde(default = "default_identifier")]
    pub identifier: String,
    /// Location of issued root macaroons.
    #[serde(default = "default_location")]
    pub location: String,
    /// Where callers ask for discharges.
    #[serde(default = "default_discharger_location")]
    pub discharger_location: String,
    /// Location of discharge macaroons.
    #[serde(default = "default_discharge_location")]
    pub discharge_location: String,
    /// The third-party condition the discharger proves.
    #[serde(default = "default_condition")]
    pub condition: String,
}

fn default_identifier() -> String {
    DEFAULT_IDENTIFIER.into()
}

fn default_location() -> String {
    DEFAULT_LOCATION.into()
}

fn default_discharger_location() -> String {
    DEFAULT_DISCHARGER_LOCATION.into()
}

fn default_discharge_location() -> String {
    DEFAULT_DISCHARGE_LOCATION.into()
}

fn default_condition() -> String {
    DEFAULT_CONDITION.into()
}

impl Settings {
    /// Settings with the given secrets and default everything else.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Empty`] if either secret is empty.
    pub fn new(
        root_secret: impl Into<Secret>,
        discharge_secret: impl Into<Secret>,
    ) -> Result<Self, SettingsError> {
        Settings {
            root_secret: root_secret.into(),
            discharge_secret: discharge_secret.into(),
            identifier: default_identifier(),
            location: default_location(),
            discharger_location: default_discharger_location(),
            discharge_location: default_discharge_location(),
            condition: default_condition(),
        }
        .validated()
    }

    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Missing`] if [`ROOT_SECRET_VAR`] or
    /// [`DISCHARGE_SECRET_VAR`] is unset.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`, which maps an environment variable
    /// name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let root_secret = lookup(ROOT_SECRET_VAR).ok_or(SettingsError::Missing(ROOT_SECRET_VAR))?;
        let discharge_secret =
            lookup(DISCHARGE_SECRET_VAR).ok_or(SettingsError::Missing(DISCHARGE_SECRET_VAR))?;

        let mut settings = Settings::new(root_secret, discharge_secret)?;
        for (name, field) in [
            (IDENTIFIER_VAR, &mut settings.identifier),
            (LOCATION_VAR, &mut settings.location),
            (DISCHARGER_LOCATION_VAR, &mut settings.discharger_location),
            (DISCHARGE_LOCATION_VAR, &mut settings.discharge_location),
            (CONDITION_VAR, &mut settings.condition),
        ] {
            if let Some(value) = lookup(name) {
                *field = value;
            }
        }
        settings.validated()
    }

    /// Parses settings from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        serde_json::from_str::<Settings>(json)?.validated()
    }

    /// The subset of settings the issuer needs.
    pub fn issuer(&self) -> IssuerSettings {
        IssuerSettings {
            root_secret: self.root_secret.clone(),
            discharge_secret: self.discharge_secret.clone(),
            identifier: self.identifier.clone(),
            location: self.location.clone(),
            discharger_location: self.discharger_location.clone(),
            condition: self.condition.clone(),
        }
    }

    /// The subset of settings the discharger needs.
    pub fn discharger(&self) -> DischargerSettings {
        DischargerSettings {
            discharge_secret: self.discharge_secret.clone(),
            location: self.discharge_location.clone(),
            condition: self.condition.clone(),
        }
    }

    fn validated(self) -> Result<Self, SettingsError> {
        if self.root_secret.is_empty() {
            return Err(SettingsError::Empty(ROOT_SECRET_VAR));
        }
        if self.discharge_secret.is_empty() {
            return Err(SettingsError::Empty(DISCHARGE_SECRET_VAR));
        }
        for (name, value) in [
            (IDENTIFIER_VAR, &self.identifier),
            (CONDITION_VAR, &self.condition),
        ] {
            if value.is_empty() {
                return Err(SettingsError::Empty(name));
            }
        }
        Ok(self)
    }
}

/// Settings of an [`Issuer`](crate::Issuer).
#[derive(Debug, Clone)]
pub struct IssuerSettings {
    /// Secret used to mint and verify root macaroons.
    pub root_secret: Secret,
    /// Secret shared with the discharger.
    pub discharge_secret: Secret,
    /// Identifier of issued root macaroons.
    pub identifier: String,
    /// Location of issued root macaroons.
    pub location: String,
    /// Location of the discharger, attached to the third-party caveat.
    pub discharger_location: String,
    /// The condition the third-party caveat asks the discharger to prove.
    pub condition: String,
}

/// Settings of a [`Discharger`](crate::Discharger).
#[derive(Debug, Clone)]
pub struct DischargerSettings {
    /// Secret shared with the issuer.
    pub discharge_secret: Secret,
    /// Location of discharge macaroons.
    pub location: String,
    /// The only condition this discharger proves.
    pub condition: String,
}
