use dialog_macaroon::{Authorization, Macaroon, Predicate, VerifyError, decode_bundle, verify};
use tracing::{debug, info, warn};

use crate::{Secret, ServiceError};

/// Verifies presented macaroons on behalf of the issuer.
///
/// The authority holds the root secret and evaluates first-party caveats
/// with a fixed policy:
///
/// - an email proved by a discharge is accepted
/// - a permission caveat is accepted only if it grants every permission the
///   caller requires
/// - any other condition is rejected
#[derive(Debug, Clone)]
pub struct Authority {
    root_secret: Secret,
}

impl Authority {
    /// An authority verifying macaroons minted with `root_secret`.
    pub fn new(root_secret: Secret) -> Self {
        Self { root_secret }
    }

    /// Verifies `root` and its bound `discharges` and checks that the root
    /// grants every permission in `required`.
    ///
    /// Failures that point at tampering or a wrong secret are logged at
    /// `warn` level.
    pub fn authorize<S: AsRef<str>>(
        &self,
        root: &Macaroon,
        discharges: &[Macaroon],
        required: &[S],
    ) -> Result<Authorization, VerifyError> {
        let check = |predicate: &Predicate| match predicate {
            Predicate::Email(_) => Ok(()),
            Predicate::Permissions(granted) => {
                match required
                    .iter()
                    .map(|permission| permission.as_ref())
                    .find(|permission| !granted.iter().any(|g| g == *permission))
                {
                    Some(missing) => Err(format!("permission {missing:?} not granted")),
                    None => Ok(()),
                }
            }
            Predicate::Field { key, .. } => Err(format!("unrecognized condition {key:?}")),
            Predicate::Raw(_) => Err("unrecognized condition".to_string()),
        };

        let identifier = String::from_utf8_lossy(root.identifier());
        match verify(root, self.root_secret.expose(), &check, discharges) {
            Ok(authorization) => {
                info!(%identifier, email = ?authorization.email, "authorized macaroon");
                Ok(authorization)
            }
            Err(error) if error.is_tamper_evident() => {
                warn!(%identifier, %error, "rejected tampered macaroon");
                Err(error)
            }
            Err(error) => {
                debug!(%identifier, %error, "rejected macaroon");
                Err(error)
            }
        }
    }

    /// Decodes a bundle produced by
    /// [`encode_bundle`](dialog_macaroon::encode_bundle) and authorizes it.
    pub fn authorize_bundle<S: AsRef<str>>(
        &self,
        bundle: &str,
        required: &[S],
    ) -> Result<Authorization, ServiceError> {
        let (root, discharges) = decode_bundle(bundle)?;
        Ok(self.authorize(&root, &discharges, required)?)
    }
}
