use crate::{Predicate, PredicateError, Signature};

/// Whether a caveat is checked locally or discharged by a third party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaveatKind {
    /// Checked by whoever holds the root key.
    FirstParty,
    /// Proved by a discharge macaroon from another party.
    ThirdParty,
}

/// A condition attached to a [`Macaroon`](crate::Macaroon).
///
/// Caveats can only be appended through the macaroon, which folds each one
/// into its signature; see [`Caveat::fold`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caveat {
    /// A predicate evaluated by the verifier.
    FirstParty {
        /// The condition bytes, usually an encoded [`Predicate`].
        condition: Vec<u8>,
    },

    /// A condition proved by a discharge macaroon.
    ThirdParty {
        /// Identifier the discharger uses to recover the discharge root key.
        /// The discharge macaroon carries the same bytes as its identifier.
        id: Vec<u8>,
        /// The discharge key sealed under the signature the macaroon had
        /// when this caveat was added.
        verification_id: Vec<u8>,
        /// Where to ask for a discharge.
        location: String,
    },
}

impl Caveat {
    /// The caveat kind.
    pub fn kind(&self) -> CaveatKind {
        match self {
            Caveat::FirstParty { .. } => CaveatKind::FirstParty,
            Caveat::ThirdParty { .. } => CaveatKind::ThirdParty,
        }
    }

    /// The caveat id: the condition of a first-party caveat, the discharge
    /// identifier of a third-party one.
    pub fn id(&self) -> &[u8] {
        match self {
            Caveat::FirstParty { condition } => condition,
            Caveat::ThirdParty { id, .. } => id,
        }
    }

    /// The sealed discharge key of a third-party caveat.
    pub fn verification_id(&self) -> Option<&[u8]> {
        match self {
            Caveat::FirstParty { .. } => None,
            Caveat::ThirdParty {
                verification_id, ..
            } => Some(verification_id),
        }
    }

    /// The discharge location of a third-party caveat.
    pub fn location(&self) -> Option<&str> {
        match self {
            Caveat::FirstParty { .. } => None,
            Caveat::ThirdParty { location, .. } => Some(location),
        }
    }

    /// Is this a first-party caveat?
    pub fn is_first_party(&self) -> bool {
        self.kind() == CaveatKind::FirstParty
    }

    /// Is this a third-party caveat?
    pub fn is_third_party(&self) -> bool {
        self.kind() == CaveatKind::ThirdParty
    }

    /// Decodes the condition of a first-party caveat.
    pub fn predicate(&self) -> Option<Result<Predicate, PredicateError>> {
        match self {
            Caveat::FirstParty { condition } => Some(Predicate::decode(condition)),
            Caveat::ThirdParty { .. } => None,
        }
    }

    /// Folds this caveat into the signature chain.
    ///
    /// Returns the signature a macaroon holds after appending this caveat to
    /// a macaroon whose signature was `signature`. The location of a
    /// third-party caveat is signed along with its id.
    pub fn fold(&self, signature: &Signature) -> Signature {
        match self {
            Caveat::FirstParty { condition } => signature.chain(condition),
            Caveat::ThirdParty {
                id,
                verification_id,
                location,
            } => signature.chain_pair(verification_id, &addressed(id, location)),
        }
    }
}

/// `len(id) || id || location`, with the length as a big-endian `u64`.
fn addressed(id: &[u8], location: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8 + id.len() + location.len());
    bytes.extend_from_slice(&(id.len() as u64).to_be_bytes());
    bytes.extend_from_slice(id);
    bytes.extend_from_slice(location.as_bytes());
    bytes
}
