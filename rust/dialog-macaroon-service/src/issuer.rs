use dialog_macaroon::{CodecError, Macaroon, MacaroonError, Predicate};
use thiserror::Error;
use tracing::info;

use crate::{IssuerSettings, PermissionRequest, Ticket, TicketError};

/// Errors raised while issuing a root macaroon.
#[derive(Debug, Clone, Error)]
pub enum IssueError {
    /// The permission request cannot be served.
    #[error("invalid request: {0}")]
    InvalidInput(&'static str),

    /// The third-party caveat id could not be sealed.
    #[error(transparent)]
    Ticket(#[from] TicketError),

    /// The macaroon could not be built.
    #[error(transparent)]
    Macaroon(#[from] MacaroonError),

    /// The macaroon could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Mints root macaroons for permission requests.
///
/// Every root macaroon carries exactly one third-party caveat, which the
/// discharger at [`IssuerSettings::discharger_location`] must prove, and one
/// first-party caveat holding the requested permissions.
#[derive(Debug, Clone)]
pub struct Issuer {
    settings: IssuerSettings,
}

impl Issuer {
    /// An issuer with the given settings.
    pub fn new(settings: IssuerSettings) -> Self {
        Self { settings }
    }

    /// The issuer settings.
    pub fn settings(&self) -> &IssuerSettings {
        &self.settings
    }

    /// Mints a root macaroon scoped to `request`.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::InvalidInput`] for an empty permission request.
    pub fn root_macaroon(&self, request: &PermissionRequest) -> Result<Macaroon, IssueError> {
        if request.permissions.is_empty() {
            return Err(IssueError::InvalidInput("no permissions requested"));
        }

        let settings = &self.settings;
        let mut macaroon = Macaroon::new(
            settings.root_secret.expose(),
            settings.identifier.as_str(),
            settings.location.as_str(),
        )?;

        let ticket = Ticket::generate(settings.condition.as_str())?;
        let caveat_id = ticket.seal(&settings.discharge_secret)?;
        macaroon.add_third_party_caveat(
            ticket.root_key(),
            caveat_id,
            settings.discharger_location.as_str(),
        )?;
        macaroon.add_predicate(&Predicate::Permissions(request.permissions.clone()))?;

        info!(
            identifier = %settings.identifier,
            permissions = ?request.permissions,
            "issued root macaroon"
        );
        Ok(macaroon)
    }

    /// Mints a root macaroon and returns its text encoding.
    pub fn root_macaroon_serialized(&self, request: &PermissionRequest) -> Result<String, IssueError> {
        Ok(self.root_macaroon(request)?.to_base64()?)
    }
}
