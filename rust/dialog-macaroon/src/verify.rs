//! Macaroon verification.
//!
//! Verification is a stateless check over its inputs:
//!
//! 1. Re-derive the root macaroon's signature from the root key and compare
//! 2. Walk the caveats in order:
//!    - first-party caveats are decoded into a [`Predicate`] and handed to a
//!      [`CaveatCheck`]
//!    - third-party caveats are matched to a discharge macaroon by id, whose
//!      signature is re-derived from the sealed discharge key and bound to
//!      the root signature, and whose own caveats are walked the same way
//! 3. Require every discharge macaroon to have been used exactly once
//!
//! On success the identity and permissions found along the way are returned
//! as an [`Authorization`].

use std::convert::Infallible;
use std::fmt::Display;

use tracing::debug;

use crate::{
    Caveat, CryptoError, DerivedKey, Macaroon, Predicate, Signature, VerifyError, open,
};

/// Decides whether a first-party caveat holds.
///
/// Implemented for every `Fn(&Predicate) -> Result<(), E>` where `E` can be
/// displayed, so a closure is usually all that is needed. Unrecognized
/// conditions arrive as [`Predicate::Raw`] or [`Predicate::Field`]; rejecting
/// those is the safe default.
pub trait CaveatCheck {
    /// Returns `Err` with a reason if the predicate is not satisfied.
    fn check(&self, predicate: &Predicate) -> Result<(), String>;
}

impl<F, E> CaveatCheck for F
where
    F: Fn(&Predicate) -> Result<(), E>,
    E: Display,
{
    fn check(&self, predicate: &Predicate) -> Result<(), String> {
        self(predicate).map_err(|error| error.to_string())
    }
}

/// A [`CaveatCheck`] that accepts every predicate.
///
/// Only useful when the caller inspects [`Authorization::conditions`] itself.
pub fn accept_all(_: &Predicate) -> Result<(), Infallible> {
    Ok(())
}

/// What a successfully verified macaroon set grants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authorization {
    /// The authenticated email carried by a discharge macaroon.
    pub email: Option<String>,

    /// The permissions granted by the root macaroon.
    ///
    /// When the root carries several permission caveats only the
    /// permissions present in all of them are granted.
    pub permissions: Vec<String>,

    /// Every first-party predicate that was checked, in verification order.
    pub conditions: Vec<Predicate>,
}

/// Verifies a root macaroon and its bound discharges.
///
/// `root_key` is the secret the root macaroon was minted with. `check`
/// decides every first-party caveat, in the root macaroon and in the
/// discharges alike.
///
/// # Errors
///
/// Returns the first [`VerifyError`] encountered; see the module docs for the
/// order of checks.
pub fn verify<C>(
    root: &Macaroon,
    root_key: &[u8],
    check: &C,
    discharges: &[Macaroon],
) -> Result<Authorization, VerifyError>
where
    C: CaveatCheck + ?Sized,
{
    if root_key.is_empty() {
        return Err(VerifyError::InvalidInput("root key must not be empty"));
    }

    let chain = Chain::derive(root, &DerivedKey::derive(root_key));
    if chain.signature != root.signature {
        debug!("root macaroon signature mismatch");
        return Err(VerifyError::SignatureMismatch);
    }

    let mut verification = Verification {
        root_signature: root.signature,
        check,
        discharges,
        used: vec![false; discharges.len()],
        authorization: Authorization::default(),
        granted: None,
    };
    verification.satisfy(root, &chain, Party::Root)?;

    if let Some(index) = verification.used.iter().position(|used| !used) {
        let identifier = String::from_utf8_lossy(discharges[index].identifier()).into_owned();
        debug!(%identifier, "discharge macaroon was not used");
        return Err(VerifyError::UnusedDischarge { identifier });
    }

    let mut authorization = verification.authorization;
    authorization.permissions = verification.granted.unwrap_or_default();
    Ok(authorization)
}

impl Macaroon {
    /// Verifies this macaroon as a root macaroon; see [`verify`].
    pub fn verify<C>(
        &self,
        root_key: &[u8],
        check: &C,
        discharges: &[Macaroon],
    ) -> Result<Authorization, VerifyError>
    where
        C: CaveatCheck + ?Sized,
    {
        verify(self, root_key, check, discharges)
    }
}

/// The signature chain of a macaroon re-derived from a key.
struct Chain {
    /// `links[i]` is the signature the macaroon held just before caveat `i`
    /// was added.
    links: Vec<Signature>,
    signature: Signature,
}

impl Chain {
    fn derive(macaroon: &Macaroon, key: &DerivedKey) -> Self {
        let mut signature = Signature::keyed(key.as_bytes(), macaroon.identifier());
        let mut links = Vec::with_capacity(macaroon.caveats().len());
        for caveat in macaroon.caveats() {
            links.push(signature);
            signature = caveat.fold(&signature);
        }
        Chain { links, signature }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Party {
    Root,
    Discharge,
}

struct Verification<'a, C: ?Sized> {
    root_signature: Signature,
    check: &'a C,
    discharges: &'a [Macaroon],
    used: Vec<bool>,
    authorization: Authorization,
    granted: Option<Vec<String>>,
}

impl<'a, C: CaveatCheck + ?Sized> Verification<'a, C> {
    fn satisfy(
        &mut self,
        macaroon: &Macaroon,
        chain: &Chain,
        party: Party,
    ) -> Result<(), VerifyError> {
        for (caveat, link) in macaroon.caveats().iter().zip(&chain.links) {
            match caveat {
                Caveat::FirstParty { condition } => self.satisfy_condition(condition, party)?,
                Caveat::ThirdParty {
                    id,
                    verification_id,
                    ..
                } => self.satisfy_discharge(id, verification_id, link)?,
            }
        }
        Ok(())
    }

    fn satisfy_condition(&mut self, condition: &[u8], party: Party) -> Result<(), VerifyError> {
        let not_satisfied = |reason: String| VerifyError::CaveatNotSatisfied {
            condition: String::from_utf8_lossy(condition).into_owned(),
            reason,
        };

        let predicate = Predicate::decode(condition).map_err(|e| not_satisfied(e.to_string()))?;
        self.check.check(&predicate).map_err(|reason| {
            debug!(%predicate, %reason, "caveat not satisfied");
            not_satisfied(reason)
        })?;

        match (&predicate, party) {
            (Predicate::Email(email), Party::Discharge) => {
                let proved = self.authorization.email.as_ref();
                if let Some(proved) = proved.filter(|proved| *proved != email) {
                    debug!(%proved, claimed = %email, "conflicting email caveat");
                    return Err(not_satisfied(format!(
                        "conflicts with proved email {proved:?}"
                    )));
                }
                self.authorization.email.get_or_insert_with(|| email.clone());
            }
            (Predicate::Permissions(permissions), Party::Root) => {
                self.granted = Some(match self.granted.take() {
                    None => permissions.clone(),
                    Some(granted) => granted
                        .into_iter()
                        .filter(|permission| permissions.contains(permission))
                        .collect(),
                });
            }
            _ => {}
        }
        self.authorization.conditions.push(predicate);
        Ok(())
    }

    fn satisfy_discharge(
        &mut self,
        caveat_id: &[u8],
        verification_id: &[u8],
        link: &Signature,
    ) -> Result<(), VerifyError> {
        let key_bytes = open(link.as_bytes(), verification_id)?;
        let key = DerivedKey::try_from(key_bytes.as_slice())
            .map_err(|_| CryptoError::Malformed(key_bytes.len()))?;

        let chain = self.find_discharge(caveat_id, &key)?;
        self.satisfy(chain.macaroon, &chain.chain, Party::Discharge)
    }

    /// Finds an unused discharge for `caveat_id` whose signature re-derives
    /// from `key` and binds to the root signature, and marks it used.
    ///
    /// Candidates with a matching identifier but a bad signature are skipped,
    /// so a stale copy does not hide a valid one.
    fn find_discharge(
        &mut self,
        caveat_id: &[u8],
        key: &DerivedKey,
    ) -> Result<Discharge<'a>, VerifyError> {
        let discharges = self.discharges;
        let mut reused = false;
        let mut mismatched = false;
        for (index, discharge) in discharges.iter().enumerate() {
            if discharge.identifier() != caveat_id {
                continue;
            }
            if self.used[index] {
                reused = true;
                continue;
            }

            let chain = Chain::derive(discharge, key);
            if chain.signature.bind_to(&self.root_signature) == discharge.signature {
                self.used[index] = true;
                return Ok(Discharge {
                    macaroon: discharge,
                    chain,
                });
            }
            mismatched = true;
        }

        let caveat_id = lossy(caveat_id);
        debug!(%caveat_id, reused, mismatched, "no valid discharge macaroon");
        Err(if mismatched {
            VerifyError::DischargeSignatureMismatch { caveat_id }
        } else if reused {
            VerifyError::DischargeReused { caveat_id }
        } else {
            VerifyError::DischargeNotFound { caveat_id }
        })
    }
}

struct Discharge<'a> {
    macaroon: &'a Macaroon,
    chain: Chain,
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use testresult::TestResult;

    const ROOT_KEY: &[u8] = b"some_shared_secret_1";
    const DISCHARGE_KEY: &[u8] = b"some_other_shared_secret_1";
    const CAVEAT_ID: &str = "is-authorized-or-whatever";

    fn root(permissions: &[&str]) -> Result<Macaroon, crate::MacaroonError> {
        let mut macaroon = Macaroon::new(ROOT_KEY, "some id", "a location")?;
        macaroon.add_third_party_caveat(DISCHARGE_KEY, CAVEAT_ID, "http://example.com")?;
        macaroon.add_predicate(&Predicate::Permissions(
            permissions.iter().map(|p| p.to_string()).collect(),
        ))?;
        Ok(macaroon)
    }

    fn discharge(email: &str) -> Result<Macaroon, crate::MacaroonError> {
        let mut macaroon = Macaroon::new(DISCHARGE_KEY, CAVEAT_ID, "remote")?;
        macaroon.add_predicate(&Predicate::Email(email.into()))?;
        Ok(macaroon)
    }

    #[test_log::test]
    fn it_authorizes_a_bound_discharge() -> TestResult {
        let root = root(&["read", "write"])?;
        let bound = discharge("me@nope.com")?.bind(root.signature());

        let authorization = verify(&root, ROOT_KEY, &accept_all, &[bound])?;

        assert_eq!(authorization.email.as_deref(), Some("me@nope.com"));
        assert_eq!(authorization.permissions, vec!["read", "write"]);
        assert_eq!(
            authorization.conditions,
            vec![
                Predicate::Email("me@nope.com".into()),
                Predicate::Permissions(vec!["read".into(), "write".into()]),
            ]
        );
        Ok(())
    }

    #[test_log::test]
    fn it_rejects_the_wrong_root_key() -> TestResult {
        let root = root(&["read"])?;
        let bound = discharge("me@nope.com")?.bind(root.signature());

        assert_eq!(
            verify(&root, b"not the secret", &accept_all, &[bound]),
            Err(VerifyError::SignatureMismatch)
        );
        assert_eq!(
            verify(&root, b"", &accept_all, &[]),
            Err(VerifyError::InvalidInput("root key must not be empty"))
        );
        Ok(())
    }

    #[test_log::test]
    fn it_requires_a_discharge() -> TestResult {
        let root = root(&["read"])?;
        assert_eq!(
            verify(&root, ROOT_KEY, &accept_all, &[]),
            Err(VerifyError::DischargeNotFound {
                caveat_id: CAVEAT_ID.into()
            })
        );
        Ok(())
    }

    #[test_log::test]
    fn it_rejects_an_unbound_discharge() -> TestResult {
        let root = root(&["read"])?;
        assert_eq!(
            verify(&root, ROOT_KEY, &accept_all, &[discharge("me@nope.com")?]),
            Err(VerifyError::DischargeSignatureMismatch {
                caveat_id: CAVEAT_ID.into()
            })
        );
        Ok(())
    }

    #[test_log::test]
    fn it_rejects_a_discharge_bound_to_another_root() -> TestResult {
        let root_a = root(&["read"])?;
        let root_b = root(&["read"])?;
        // Same caveat id, but a fresh verification id gives a new signature.
        assert_ne!(root_a.signature(), root_b.signature());

        let bound_to_a = discharge("me@nope.com")?.bind(root_a.signature());
        assert!(verify(&root_a, ROOT_KEY, &accept_all, &[bound_to_a.clone()]).is_ok());
        assert_eq!(
            verify(&root_b, ROOT_KEY, &accept_all, &[bound_to_a]),
            Err(VerifyError::DischargeSignatureMismatch {
                caveat_id: CAVEAT_ID.into()
            })
        );
        Ok(())
    }

    #[test_log::test]
    fn it_rejects_a_discharge_minted_with_another_key() -> TestResult {
        let root = root(&["read"])?;
        let mut forged = Macaroon::new(b"guessed", CAVEAT_ID, "remote")?;
        forged.add_predicate(&Predicate::Email("me@nope.com".into()))?;

        assert_eq!(
            verify(&root, ROOT_KEY, &accept_all, &[forged.bind(root.signature())]),
            Err(VerifyError::DischargeSignatureMismatch {
                caveat_id: CAVEAT_ID.into()
            })
        );
        Ok(())
    }

    #[test_log::test]
    fn it_rejects_unused_discharges() -> TestResult {
        let root = root(&["read"])?;
        let bound = discharge("me@nope.com")?.bind(root.signature());
        let stray = Macaroon::new(b"other", "stray", "remote")?.bind(root.signature());

        assert_eq!(
            verify(&root, ROOT_KEY, &accept_all, &[bound, stray]),
            Err(VerifyError::UnusedDischarge {
                identifier: "stray".into()
            })
        );
        Ok(())
    }

    #[test_log::test]
    fn it_uses_each_discharge_once() -> TestResult {
        let mut root = Macaroon::new(ROOT_KEY, "some id", "a location")?;
        root.add_third_party_caveat(DISCHARGE_KEY, CAVEAT_ID, "http://example.com")?;
        root.add_third_party_caveat(DISCHARGE_KEY, CAVEAT_ID, "http://example.com")?;
        let bound = discharge("me@nope.com")?.bind(root.signature());

        assert_eq!(
            verify(&root, ROOT_KEY, &accept_all, std::slice::from_ref(&bound)),
            Err(VerifyError::DischargeReused {
                caveat_id: CAVEAT_ID.into()
            })
        );
        assert!(verify(&root, ROOT_KEY, &accept_all, &[bound.clone(), bound]).is_ok());
        Ok(())
    }

    #[test_log::test]
    fn it_rejects_a_conflicting_email_appended_by_the_holder() -> TestResult {
        let root = root(&["read"])?;
        let mut attenuated = discharge("me@nope.com")?;
        attenuated.add_predicate(&Predicate::Email("admin@corp.com".into()))?;

        assert_eq!(
            verify(
                &root,
                ROOT_KEY,
                &accept_all,
                &[attenuated.bind(root.signature())]
            ),
            Err(VerifyError::CaveatNotSatisfied {
                condition: "email=admin@corp.com".into(),
                reason: r#"conflicts with proved email "me@nope.com""#.into(),
            })
        );

        let mut repeated = discharge("me@nope.com")?;
        repeated.add_predicate(&Predicate::Email("me@nope.com".into()))?;
        let authorization = verify(
            &root,
            ROOT_KEY,
            &accept_all,
            &[repeated.bind(root.signature())],
        )?;
        assert_eq!(authorization.email.as_deref(), Some("me@nope.com"));
        Ok(())
    }

    #[test_log::test]
    fn it_rejects_conflicting_emails_across_discharges() -> TestResult {
        let root = root(&["read"])?;

        let mut first = Macaroon::new(DISCHARGE_KEY, CAVEAT_ID, "remote")?;
        first.add_predicate(&Predicate::Email("me@nope.com".into()))?;
        first.add_third_party_caveat(b"mfa key", "has-second-factor", "https://mfa")?;
        let mut second = Macaroon::new(b"mfa key", "has-second-factor", "remote")?;
        second.add_predicate(&Predicate::Email("admin@corp.com".into()))?;

        assert!(matches!(
            verify(
                &root,
                ROOT_KEY,
                &accept_all,
                &[first.bind(root.signature()), second.bind(root.signature())]
            ),
            Err(VerifyError::CaveatNotSatisfied { .. })
        ));
        Ok(())
    }

    #[test_log::test]
    fn it_looks_past_a_stale_copy_of_a_discharge() -> TestResult {
        let root = root(&["read"])?;
        let unrelated = Macaroon::new(ROOT_KEY, "other id", "a location")?;
        let stale = discharge("me@nope.com")?.bind(unrelated.signature());
        let bound = discharge("me@nope.com")?.bind(root.signature());

        // The valid copy satisfies the caveat whatever its position; only the
        // stale one is left over.
        for discharges in [
            [stale.clone(), bound.clone()],
            [bound.clone(), stale.clone()],
        ] {
            assert_eq!(
                verify(&root, ROOT_KEY, &accept_all, &discharges),
                Err(VerifyError::UnusedDischarge {
                    identifier: CAVEAT_ID.into()
                })
            );
        }
        assert_eq!(
            verify(&root, ROOT_KEY, &accept_all, &[stale]),
            Err(VerifyError::DischargeSignatureMismatch {
                caveat_id: CAVEAT_ID.into()
            })
        );
        Ok(())
    }

    #[test_log::test]
    fn it_signs_third_party_locations() -> TestResult {
        let mut root = root(&["read"])?;
        let bound = discharge("me@nope.com")?.bind(root.signature());

        if let Caveat::ThirdParty { location, .. } = &mut root.caveats[0] {
            *location = "http://evil.example".into();
        }

        assert_eq!(
            verify(&root, ROOT_KEY, &accept_all, &[bound]),
            Err(VerifyError::SignatureMismatch)
        );
        Ok(())
    }

    #[test_log::test]
    fn it_reports_rejected_caveats() -> TestResult {
        let root = root(&["read"])?;
        let bound = discharge("someone@else.com")?.bind(root.signature());

        let only_me = |predicate: &Predicate| match predicate.email() {
            Some("me@nope.com") | None => Ok(()),
            Some(other) => Err(format!("{other} is not allowed")),
        };

        assert_eq!(
            verify(&root, ROOT_KEY, &only_me, &[bound]),
            Err(VerifyError::CaveatNotSatisfied {
                condition: "email=someone@else.com".into(),
                reason: "someone@else.com is not allowed".into(),
            })
        );
        Ok(())
    }

    #[test_log::test]
    fn it_rejects_undecodable_conditions() -> TestResult {
        let mut root = Macaroon::new(ROOT_KEY, "some id", "a location")?;
        root.add_first_party_caveat(vec![0xff, 0x00])?;

        assert!(matches!(
            verify(&root, ROOT_KEY, &accept_all, &[]),
            Err(VerifyError::CaveatNotSatisfied { .. })
        ));
        Ok(())
    }

    #[test_log::test]
    fn it_follows_caveats_on_discharges() -> TestResult {
        let root = root(&["read"])?;

        let mut first = Macaroon::new(DISCHARGE_KEY, CAVEAT_ID, "remote")?;
        first.add_predicate(&Predicate::Email("me@nope.com".into()))?;
        first.add_third_party_caveat(b"mfa key", "has-second-factor", "https://mfa")?;

        let mut second = Macaroon::new(b"mfa key", "has-second-factor", "remote")?;
        second.add_first_party_caveat("factor=totp")?;

        let discharges = [first.bind(root.signature()), second.bind(root.signature())];
        let authorization = verify(&root, ROOT_KEY, &accept_all, &discharges)?;
        assert_eq!(authorization.email.as_deref(), Some("me@nope.com"));
        assert!(authorization.conditions.contains(&Predicate::Field {
            key: "factor".into(),
            value: "totp".into()
        }));

        assert_eq!(
            verify(&root, ROOT_KEY, &accept_all, &discharges[..1]),
            Err(VerifyError::DischargeNotFound {
                caveat_id: "has-second-factor".into()
            })
        );
        Ok(())
    }

    #[test_log::test]
    fn it_intersects_permission_caveats() -> TestResult {
        let mut root = root(&["read", "write"])?;
        root.add_predicate(&Predicate::Permissions(vec!["read".into()]))?;
        let bound = discharge("me@nope.com")?.bind(root.signature());

        let authorization = verify(&root, ROOT_KEY, &accept_all, &[bound])?;
        assert_eq!(authorization.permissions, vec!["read"]);
        Ok(())
    }

    #[test_log::test]
    fn it_ignores_identity_claims_on_the_root() -> TestResult {
        let mut root = root(&["read"])?;
        root.add_predicate(&Predicate::Email("root@nope.com".into()))?;
        let bound = discharge("me@nope.com")?.bind(root.signature());

        let authorization = verify(&root, ROOT_KEY, &accept_all, &[bound])?;
        assert_eq!(authorization.email.as_deref(), Some("me@nope.com"));
        Ok(())
    }

    fn flip(bytes: &mut [u8], index: usize, bit: u8) {
        let index = index % bytes.len();
        bytes[index] ^= 1 << (bit % 8);
    }

    proptest! {
        #[test]
        fn tampered_root_caveats_break_the_signature(
            caveat in 0usize..2,
            index in any::<usize>(),
            bit in any::<u8>(),
        ) {
            let mut root = root(&["read", "write"]).unwrap();
            let bound = discharge("me@nope.com").unwrap().bind(root.signature());

            match &mut root.caveats[caveat] {
                Caveat::FirstParty { condition } => flip(condition, index, bit),
                Caveat::ThirdParty { id, location, .. } => {
                    if bit % 2 == 0 {
                        flip(id, index, bit);
                    } else {
                        location.push_str("/elsewhere");
                    }
                }
            }

            prop_assert_eq!(
                verify(&root, ROOT_KEY, &accept_all, &[bound]),
                Err(VerifyError::SignatureMismatch)
            );
        }

        #[test]
        fn tampered_discharge_caveats_break_the_binding(
            index in any::<usize>(),
            bit in any::<u8>(),
        ) {
            let root = root(&["read"]).unwrap();
            let mut bound = discharge("me@nope.com").unwrap().bind(root.signature());

            if let Caveat::FirstParty { condition } = &mut bound.caveats[0] {
                flip(condition, index, bit);
            }

            prop_assert_eq!(
                verify(&root, ROOT_KEY, &accept_all, &[bound]),
                Err(VerifyError::DischargeSignatureMismatch { caveat_id: CAVEAT_ID.into() })
            );
        }
    }
}
