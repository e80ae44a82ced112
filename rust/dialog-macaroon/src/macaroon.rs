//! The macaroon token and its caveat chain.

use std::fmt::{Debug, Formatter};

use crate::{Caveat, DerivedKey, MacaroonError, Predicate, Signature, seal};

/// A bearer token with a chained list of caveats.
///
/// The signature is always a pure function of the root key, the identifier
/// and the caveats in order. There is no way to set it, remove a caveat or
/// reorder caveats; the only mutations are the two `add_*` methods, which
/// re-derive the signature as they append.
#[derive(Clone, PartialEq, Eq)]
pub struct Macaroon {
    pub(crate) identifier: Vec<u8>,
    pub(crate) location: String,
    pub(crate) caveats: Vec<Caveat>,
    pub(crate) signature: Signature,
}

impl Macaroon {
    /// Mints a macaroon with no caveats.
    ///
    /// # Errors
    ///
    /// Returns [`MacaroonError::InvalidInput`] if `root_key` or `identifier`
    /// is empty.
    pub fn new(
        root_key: &[u8],
        identifier: impl Into<Vec<u8>>,
        location: impl Into<String>,
    ) -> Result<Self, MacaroonError> {
        if root_key.is_empty() {
            return Err(MacaroonError::InvalidInput("root key must not be empty"));
        }
        Self::with_key(&DerivedKey::derive(root_key), identifier, location)
    }

    /// Mints a macaroon whose chain starts from an already derived key.
    pub fn with_key(
        key: &DerivedKey,
        identifier: impl Into<Vec<u8>>,
        location: impl Into<String>,
    ) -> Result<Self, MacaroonError> {
        let identifier = identifier.into();
        if identifier.is_empty() {
            return Err(MacaroonError::InvalidInput("identifier must not be empty"));
        }

        Ok(Macaroon {
            signature: Signature::keyed(key.as_bytes(), &identifier),
            identifier,
            location: location.into(),
            caveats: Vec::new(),
        })
    }

    /// The identifier, used by the root key holder to find the root key.
    pub fn identifier(&self) -> &[u8] {
        &self.identifier
    }

    /// Advisory hint naming where the macaroon comes from.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The caveats in the order they were added.
    pub fn caveats(&self) -> &[Caveat] {
        &self.caveats
    }

    /// The current signature.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The caveats that need a discharge macaroon.
    pub fn third_party_caveats(&self) -> impl Iterator<Item = &Caveat> {
        self.caveats.iter().filter(|caveat| caveat.is_third_party())
    }

    /// The first third-party caveat to be discharged at `location`.
    pub fn third_party_caveat_at(&self, location: &str) -> Option<&Caveat> {
        self.third_party_caveats()
            .find(|caveat| caveat.location() == Some(location))
    }

    /// Appends a first-party caveat.
    ///
    /// # Errors
    ///
    /// Returns [`MacaroonError::InvalidInput`] if `condition` is empty.
    pub fn add_first_party_caveat(
        &mut self,
        condition: impl Into<Vec<u8>>,
    ) -> Result<(), MacaroonError> {
        let condition = condition.into();
        if condition.is_empty() {
            return Err(MacaroonError::InvalidInput("caveat condition must not be empty"));
        }
        self.append(Caveat::FirstParty { condition });
        Ok(())
    }

    /// Appends a first-party caveat holding the wire form of `predicate`.
    pub fn add_predicate(&mut self, predicate: &Predicate) -> Result<(), MacaroonError> {
        self.add_first_party_caveat(predicate.encode()?)
    }

    /// Appends a third-party caveat.
    ///
    /// The key derived from `discharge_root_key` is sealed under the current
    /// signature, so only someone who can re-derive the chain up to this
    /// point (the root key holder) can recover it. The discharger mints its
    /// discharge macaroon from the same `discharge_root_key` with `caveat_id`
    /// as the identifier.
    ///
    /// # Errors
    ///
    /// Returns [`MacaroonError::InvalidInput`] if the key or id is empty and
    /// [`MacaroonError::Crypto`] if sealing fails.
    pub fn add_third_party_caveat(
        &mut self,
        discharge_root_key: &[u8],
        caveat_id: impl Into<Vec<u8>>,
        location: impl Into<String>,
    ) -> Result<(), MacaroonError> {
        if discharge_root_key.is_empty() {
            return Err(MacaroonError::InvalidInput(
                "discharge root key must not be empty",
            ));
        }
        let id = caveat_id.into();
        if id.is_empty() {
            return Err(MacaroonError::InvalidInput("caveat id must not be empty"));
        }

        let discharge_key = DerivedKey::derive(discharge_root_key);
        let verification_id = seal(self.signature.as_bytes(), discharge_key.as_bytes())?;

        self.append(Caveat::ThirdParty {
            id,
            verification_id,
            location: location.into(),
        });
        Ok(())
    }

    /// Binds this discharge macaroon to the root macaroon signature
    /// `root_signature`.
    ///
    /// The result has the same identifier and caveats and a signature that
    /// only verifies alongside that root signature. `self` is left as is, so
    /// binding the same discharge to the same root twice gives equal
    /// results. Bind a fresh discharge per root macaroon; there is no unbind.
    #[must_use]
    pub fn bind(&self, root_signature: &Signature) -> Macaroon {
        Macaroon {
            signature: self.signature.bind_to(root_signature),
            ..self.clone()
        }
    }

    fn append(&mut self, caveat: Caveat) {
        self.signature = caveat.fold(&self.signature);
        self.caveats.push(caveat);
    }
}

impl Debug for Macaroon {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Macaroon")
            .field("identifier", &String::from_utf8_lossy(&self.identifier))
            .field("location", &self.location)
            .field("caveats", &self.caveats)
            .field("signature", &self.signature)
            .finish()
    }
}
