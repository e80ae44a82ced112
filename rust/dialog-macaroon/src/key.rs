use std::fmt::{Debug, Formatter};

use crate::signature::{SIGNATURE_SIZE, hmac_sha256};

/// The size of a derived key in bytes.
pub const KEY_SIZE: usize = SIGNATURE_SIZE;

const KEY_GENERATOR: &[u8] = b"macaroons-key-generator";

/// A fixed-size key derived from variable-length secret material.
///
/// Macaroon root keys may be any non-empty byte string. They are never used
/// directly: the first link of a signature chain is keyed with
/// `HMAC-SHA256("macaroons-key-generator", root_key)`. The same derived key is
/// what a third-party caveat seals into its verification id.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
    /// Derives the signing key for a macaroon root key.
    pub fn derive(root_key: &[u8]) -> Self {
        Self::for_context(KEY_GENERATOR, root_key)
    }

    /// Derives a key for a purpose other than signing, so that one secret can
    /// back several independent keys.
    pub fn for_context(context: &[u8], secret: &[u8]) -> Self {
        Self(hmac_sha256(context, secret))
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl TryFrom<&[u8]> for DerivedKey {
    type Error = std::array::TryFromSliceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(DerivedKey(value.try_into()?))
    }
}

impl Debug for DerivedKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}
