use dialog_macaroon::{CodecError, Macaroon, MacaroonError, Predicate};
use thiserror::Error;
use tracing::{debug, info};

use crate::{AuthenticationError, Authenticator, DischargeRequest, DischargerSettings, Ticket};

/// Errors raised while discharging a third-party caveat.
#[derive(Debug, Clone, Error)]
pub enum DischargeError {
    /// The caveat id was not issued for this discharger.
    #[error("unknown caveat")]
    UnknownCaveat,

    /// The caller could not be authenticated.
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    /// The discharge macaroon could not be built.
    #[error(transparent)]
    Macaroon(#[from] MacaroonError),

    /// The discharge macaroon could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Proves third-party caveats by authenticating the caller.
///
/// The discharge macaroon it returns is unbound; the caller binds it to the
/// root macaroon before presenting both.
#[derive(Debug, Clone)]
pub struct Discharger<A> {
    settings: DischargerSettings,
    authenticator: A,
}

impl<A: Authenticator> Discharger<A> {
    /// A discharger checking identities with `authenticator`.
    pub fn new(settings: DischargerSettings, authenticator: A) -> Self {
        Self {
            settings,
            authenticator,
        }
    }

    /// Mints a discharge macaroon for `request`.
    ///
    /// The discharge carries the authenticated email as a first-party caveat.
    ///
    /// # Errors
    ///
    /// Returns [`DischargeError::UnknownCaveat`] if the caveat id does not
    /// open under the discharge secret or names another condition, and
    /// [`DischargeError::Authentication`] if the credentials are rejected.
    pub async fn discharge_caveat(
        &self,
        request: &DischargeRequest,
    ) -> Result<Macaroon, DischargeError> {
        let ticket = Ticket::open(&request.caveat_id, &self.settings.discharge_secret)
            .map_err(|error| {
                debug!(%error, "caveat id does not open");
                DischargeError::UnknownCaveat
            })?;
        if ticket.condition() != self.settings.condition {
            debug!(condition = %ticket.condition(), "caveat names an unknown condition");
            return Err(DischargeError::UnknownCaveat);
        }

        let identity = self
            .authenticator
            .authenticate(&request.credentials())
            .await
            .inspect_err(|error| debug!(email = %request.email, %error, "authentication failed"))?;

        let mut discharge = Macaroon::new(
            ticket.root_key(),
            request.caveat_id.as_bytes(),
            self.settings.location.as_str(),
        )?;
        discharge.add_predicate(&Predicate::Email(identity.email.clone()))?;

        info!(email = %identity.email, condition = %ticket.condition(), "discharged caveat");
        Ok(discharge)
    }

    /// Mints a discharge macaroon and returns its text encoding.
    pub async fn discharge_caveat_serialized(
        &self,
        request: &DischargeRequest,
    ) -> Result<String, DischargeError> {
        Ok(self.discharge_caveat(request).await?.to_base64()?)
    }
}
