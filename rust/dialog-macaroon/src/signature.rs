use std::array::TryFromSliceError;
use std::fmt::{Debug, Display, Formatter};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// The size of a macaroon signature in bytes.
///
/// Signatures are HMAC-SHA256 outputs.
pub const SIGNATURE_SIZE: usize = 32;

const ZERO_KEY: [u8; SIGNATURE_SIZE] = [0u8; SIGNATURE_SIZE];

/// The chained HMAC-SHA256 signature of a [`Macaroon`](crate::Macaroon).
///
/// Each signature is the key for the next link of the chain, so a signature
/// commits to the identifier and to every caveat before it, in order.
/// Equality is checked in constant time.
#[derive(Clone, Copy)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Signature {
    /// The raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    /// HMAC of `data` keyed with `key`.
    pub(crate) fn keyed(key: &[u8; SIGNATURE_SIZE], data: &[u8]) -> Self {
        Self(hmac_sha256(key, data))
    }

    /// Next link of the chain: HMAC of `data` keyed with this signature.
    pub(crate) fn chain(&self, data: &[u8]) -> Self {
        Self::keyed(&self.0, data)
    }

    /// Next link of the chain over two values.
    ///
    /// Each value is hashed separately and the concatenated digests are
    /// hashed again, so `(a, b)` can never collide with a different split of
    /// the same bytes.
    pub(crate) fn chain_pair(&self, first: &[u8], second: &[u8]) -> Self {
        keyed_pair(&self.0, first, second)
    }

    /// Signature of a discharge bound to the root signature `root`.
    ///
    /// A discharge whose signature already equals the root signature is left
    /// unchanged.
    pub fn bind_to(&self, root: &Signature) -> Self {
        if self == root {
            return *root;
        }
        keyed_pair(&ZERO_KEY, &root.0, &self.0)
    }
}

fn keyed_pair(key: &[u8; SIGNATURE_SIZE], first: &[u8], second: &[u8]) -> Signature {
    let mut joined = [0u8; SIGNATURE_SIZE * 2];
    joined[..SIGNATURE_SIZE].copy_from_slice(&hmac_sha256(key, first));
    joined[SIGNATURE_SIZE..].copy_from_slice(&hmac_sha256(key, second));
    Signature::keyed(key, &joined)
}

pub(crate) fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; SIGNATURE_SIZE] {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for Signature {}

impl From<[u8; SIGNATURE_SIZE]> for Signature {
    fn from(value: [u8; SIGNATURE_SIZE]) -> Self {
        Signature(value)
    }
}

impl TryFrom<&[u8]> for Signature {
    type Error = TryFromSliceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Signature(value.try_into()?))
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Signature").field(&self.to_string()).finish()
    }
}
